use fnv::FnvHashMap;

/// Maps the string identifiers of subjects and items to consecutive integer indices, in order
/// of first appearance, and counts the ratings seen along the way.
pub struct DataDictionary {
    subject_dict: FnvHashMap<String, usize>,
    item_dict: FnvHashMap<String, usize>,
    subject_names: Vec<String>,
    item_names: Vec<String>,
    num_ratings: u64,
}

impl DataDictionary {

    pub fn num_subjects(&self) -> usize {
        self.subject_dict.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_dict.len()
    }

    pub fn num_ratings(&self) -> u64 {
        self.num_ratings
    }

    pub fn subject_index(&self, name: &str) -> Option<usize> {
        self.subject_dict.get(name).cloned()
    }

    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.item_dict.get(name).cloned()
    }

    /// Hands out the labels, indexed by the integer ids this dictionary assigned.
    pub fn into_labels(self) -> (Vec<String>, Vec<String>) {
        (self.subject_names, self.item_names)
    }
}

impl DataDictionary {

    pub fn from_pairs<S, T>(pairs: T) -> Self
        where S: AsRef<str>, T: IntoIterator<Item=(S, S)> {

        let mut subject_dict: FnvHashMap<String, usize> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut subject_names = Vec::new();

        let mut item_dict: FnvHashMap<String, usize> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut item_names = Vec::new();

        let mut num_ratings: u64 = 0;

        for (subject, item) in pairs {
            let subject = subject.as_ref();
            let item = item.as_ref();

            if !subject_dict.contains_key(subject) {
                subject_dict.insert(subject.to_owned(), subject_names.len());
                subject_names.push(subject.to_owned());
            }

            if !item_dict.contains_key(item) {
                item_dict.insert(item.to_owned(), item_names.len());
                item_names.push(item.to_owned());
            }

            num_ratings += 1;
        }

        DataDictionary { subject_dict, item_dict, subject_names, item_names, num_ratings }
    }
}
