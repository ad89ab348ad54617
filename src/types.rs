/**
 * RateReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use fnv::FnvHashSet;
use ndarray::Array2;

use crate::errors::{CfError, Result};

/// A dense subject-by-item table with string labels for its rows and columns. Every table
/// derived from a ratings matrix (mask, predictions) carries exactly the same labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Table<T> {
    subjects: Vec<String>,
    items: Vec<String>,
    values: Array2<T>,
}

/// Ratings, missing cells are `NaN`.
pub type RatingsMatrix = Table<f64>;

/// `true` marks a cell as observed, i.e. usable for training.
pub type Mask = Table<bool>;

pub fn default_labels(num_labels: usize) -> Vec<String> {
    (0..num_labels).map(|index| index.to_string()).collect()
}

impl<T> Table<T> {

    pub fn new(subjects: Vec<String>, items: Vec<String>, values: Array2<T>) -> Result<Self> {

        let (num_subjects, num_items) = values.dim();

        if num_subjects == 0 || num_items == 0 {
            return Err(CfError::Construction(
                format!("table must not be empty, got shape ({}, {})", num_subjects, num_items)));
        }

        if subjects.len() != num_subjects || items.len() != num_items {
            return Err(CfError::Construction(format!(
                "{} subject and {} item labels do not match values of shape ({}, {})",
                subjects.len(), items.len(), num_subjects, num_items)));
        }

        ensure_unique("subject", &subjects)?;
        ensure_unique("item", &items)?;

        Ok(Table { subjects, items, values })
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn values(&self) -> &Array2<T> {
        &self.values
    }

    pub fn into_values(self) -> Array2<T> {
        self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn num_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn same_labels<U>(&self, other: &Table<U>) -> bool {
        self.subjects == other.subjects && self.items == other.items
    }

    /// Builds a table with our labels around new values of the same shape.
    pub(crate) fn relabel<U>(&self, values: Array2<U>) -> Table<U> {
        debug_assert_eq!(values.dim(), self.values.dim());
        Table {
            subjects: self.subjects.clone(),
            items: self.items.clone(),
            values,
        }
    }

    /// Replaces the item labels, used when columns are merged into bins.
    pub(crate) fn with_items<U>(&self, items: Vec<String>, values: Array2<U>) -> Table<U> {
        debug_assert_eq!(values.dim(), (self.subjects.len(), items.len()));
        Table {
            subjects: self.subjects.clone(),
            items,
            values,
        }
    }
}

fn ensure_unique(kind: &str, labels: &[String]) -> Result<()> {
    let mut seen: FnvHashSet<&str> =
        FnvHashSet::with_capacity_and_hasher(labels.len(), Default::default());

    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(CfError::Construction(format!("duplicate {} label '{}'", kind, label)));
        }
    }

    Ok(())
}

fn from_nested_rows<T: Copy>(rows: Vec<Vec<T>>) -> Result<Array2<T>> {
    let num_rows = rows.len();
    let num_columns = rows.first().map(|row| row.len()).unwrap_or(0);

    if rows.iter().any(|row| row.len() != num_columns) {
        return Err(CfError::Construction(String::from("rows have different lengths")));
    }

    let flat: Vec<T> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((num_rows, num_columns), flat)
        .map_err(|error| CfError::Construction(error.to_string()))
}

impl RatingsMatrix {

    /// Ratings with consecutive numbers as subject and item labels.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let values = from_nested_rows(rows)?;
        let (num_subjects, num_items) = values.dim();
        Table::new(default_labels(num_subjects), default_labels(num_items), values)
    }

    pub fn get(&self, subject: usize, item: usize) -> f64 {
        self.values[[subject, item]]
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|value| value.is_nan())
    }

    /// The mask of all cells which hold an actual rating.
    pub fn observed(&self) -> Mask {
        self.relabel(self.values.mapv(|value| !value.is_nan()))
    }

    /// Keeps the ratings where the mask is set, everything else becomes missing.
    pub fn masked(&self, mask: &Mask) -> RatingsMatrix {
        let mut values = self.values.clone();
        values.zip_mut_with(mask.values(), |value, &keep| {
            if !keep {
                *value = std::f64::NAN;
            }
        });
        self.relabel(values)
    }
}

impl Mask {

    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self> {
        let values = from_nested_rows(rows)?;
        let (num_subjects, num_items) = values.dim();
        Table::new(default_labels(num_subjects), default_labels(num_items), values)
    }

    pub fn count(&self) -> usize {
        self.values.iter().filter(|&&flag| flag).count()
    }

    pub fn count_per_subject(&self) -> Vec<usize> {
        self.values.outer_iter()
            .map(|row| row.iter().filter(|&&flag| flag).count())
            .collect()
    }

    pub fn complement(&self) -> Mask {
        self.relabel(self.values.mapv(|flag| !flag))
    }
}
