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

use ndarray::Array2;
use rand::Rng;

use crate::errors::{self, CfError, Result};
use crate::temporal::{self, TargetType};
use crate::types::{Mask, RatingsMatrix};

/// The state every model shares: the ratings, the optional train mask with the ratings it lets
/// through, the dilated mask once dilation happened, and the predictions once `predict()` ran.
///
/// Transitions (`with_split`, `with_dilation`, `with_downsample`) never touch `self`, they hand
/// out a new state which the caller commits as a whole.
#[derive(Clone, Debug)]
pub struct ModelState {
    ratings: RatingsMatrix,
    train_mask: Option<Mask>,
    masked_ratings: Option<RatingsMatrix>,
    dilated_mask: Option<Mask>,
    predicted_ratings: Option<RatingsMatrix>,
    is_fit: bool,
}

impl ModelState {

    /// Without an explicit mask, ratings with missing cells are masked by their observed cells.
    /// Fully observed ratings without a mask stay unmasked.
    pub fn new(ratings: RatingsMatrix, mask: Option<Mask>) -> Result<Self> {

        if ratings.values().iter().any(|value| value.is_infinite()) {
            return Err(CfError::Construction(
                String::from("ratings must be finite numbers or NaN for missing cells")));
        }

        let train_mask = match mask {
            Some(mask) => {
                if !mask.same_labels(&ratings) {
                    return Err(CfError::Construction(
                        String::from("mask labels differ from the ratings labels")));
                }
                Some(mask)
            },
            None if ratings.has_missing() => Some(ratings.observed()),
            None => None,
        };

        let masked_ratings = train_mask.as_ref().map(|mask| ratings.masked(mask));

        Ok(ModelState {
            ratings,
            train_mask,
            masked_ratings,
            dilated_mask: None,
            predicted_ratings: None,
            is_fit: false,
        })
    }

    pub fn ratings(&self) -> &RatingsMatrix {
        &self.ratings
    }

    pub fn train_mask(&self) -> Option<&Mask> {
        self.train_mask.as_ref()
    }

    pub fn masked_ratings(&self) -> Option<&RatingsMatrix> {
        self.masked_ratings.as_ref()
    }

    pub fn dilated_mask(&self) -> Option<&Mask> {
        self.dilated_mask.as_ref()
    }

    pub fn predicted_ratings(&self) -> Option<&RatingsMatrix> {
        self.predicted_ratings.as_ref()
    }

    pub fn is_fit(&self) -> bool {
        self.is_fit
    }

    pub fn is_predict(&self) -> bool {
        self.predicted_ratings.is_some()
    }

    pub fn is_mask(&self) -> bool {
        self.train_mask.is_some()
    }

    pub fn is_mask_dilated(&self) -> bool {
        self.dilated_mask.is_some()
    }

    /// The mask the models learn from: the dilated mask once dilation happened, the train mask
    /// otherwise, nothing for unmasked models.
    pub fn training_mask(&self) -> Option<&Mask> {
        self.dilated_mask.as_ref().or_else(|| self.train_mask.as_ref())
    }

    /// The ratings the models learn from, cells outside the training mask are missing.
    pub fn training_ratings(&self) -> &RatingsMatrix {
        self.masked_ratings.as_ref().unwrap_or(&self.ratings)
    }

    /// Cells the models may learn from, i.e. inside the training mask and actually rated.
    pub(crate) fn training_cells(&self) -> Array2<bool> {
        let training_ratings = self.training_ratings().values();
        match self.training_mask() {
            Some(mask) => {
                let mut cells = mask.values().clone();
                cells.zip_mut_with(training_ratings, |cell, value| *cell = *cell && !value.is_nan());
                cells
            },
            None => training_ratings.mapv(|value| !value.is_nan()),
        }
    }

    /// Marks `n_train_items` items per subject, drawn uniformly without replacement and
    /// independently for each subject, as training items. Replaces any previous mask, including
    /// a dilated one.
    pub fn with_split<R: Rng>(&self, n_train_items: usize, rng: &mut R) -> Result<ModelState> {

        let (num_subjects, num_items) = self.ratings.shape();

        if n_train_items == 0 || n_train_items > num_items {
            return errors::invalid_argument(
                "n_train_items",
                format!("{} is not within 1..={}", n_train_items, num_items));
        }

        let mut flags = Array2::from_elem((num_subjects, num_items), false);

        for mut row in flags.outer_iter_mut() {
            for item in rand::seq::index::sample(rng, num_items, n_train_items).into_iter() {
                row[item] = true;
            }
        }

        let train_mask = self.ratings.relabel(flags);

        let mut next = self.clone();
        next.masked_ratings = Some(self.ratings.masked(&train_mask));
        next.train_mask = Some(train_mask);
        next.dilated_mask = None;

        Ok(next)
    }

    /// Dilates the current masked ratings by `n_samples` (centred, overlapping ratings are
    /// averaged), the dilated ratings replace the masked ratings and define the dilated mask.
    /// Calling this again dilates the already dilated ratings.
    pub fn with_dilation(&self, n_samples: usize) -> Result<ModelState> {

        if n_samples == 0 {
            return errors::invalid_argument("n_samples", "must dilate by at least one sample");
        }

        let masked_ratings = self.masked_ratings.as_ref().ok_or(CfError::NoMask)?;

        let dilated = masked_ratings.relabel(temporal::dilate_rows(masked_ratings.values(), n_samples));

        let mut next = self.clone();
        next.dilated_mask = Some(dilated.observed());
        next.masked_ratings = Some(dilated);

        Ok(next)
    }

    /// Averages bins of consecutive items in every table the state holds. Masks are set for a
    /// bin when any of its cells was set.
    pub fn with_downsample(
        &self,
        sampling_freq: f64,
        target: f64,
        target_type: TargetType,
    ) -> Result<ModelState> {

        let n_samples = temporal::samples_per_bin(sampling_freq, target, target_type)?;
        let items = temporal::bin_labels(self.ratings.items(), n_samples);

        let bin_ratings = |table: &RatingsMatrix| {
            table.with_items(items.clone(), temporal::bin_columns(table.values(), n_samples))
        };
        let bin_mask = |table: &Mask| {
            table.with_items(items.clone(), temporal::bin_flags(table.values(), n_samples))
        };

        Ok(ModelState {
            ratings: bin_ratings(&self.ratings),
            train_mask: self.train_mask.as_ref().map(&bin_mask),
            masked_ratings: self.masked_ratings.as_ref().map(&bin_ratings),
            dilated_mask: self.dilated_mask.as_ref().map(&bin_mask),
            predicted_ratings: self.predicted_ratings.as_ref().map(&bin_ratings),
            is_fit: self.is_fit,
        })
    }

    /// Commits a successful fit, earlier predictions belong to the previous fit and are dropped.
    pub(crate) fn into_fitted(mut self) -> ModelState {
        self.is_fit = true;
        self.predicted_ratings = None;
        self
    }

    pub(crate) fn set_predictions(&mut self, predicted_ratings: RatingsMatrix) -> &RatingsMatrix {
        debug_assert!(predicted_ratings.same_labels(&self.ratings));
        self.predicted_ratings.insert(predicted_ratings)
    }
}


#[cfg(test)]
mod tests {

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::base::ModelState;
    use crate::errors::CfError;
    use crate::temporal::TargetType;
    use crate::types::{Mask, RatingsMatrix};

    const NAN: f64 = std::f64::NAN;

    fn ratings() -> RatingsMatrix {
        RatingsMatrix::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 3.0, 4.0, 5.0, 6.0],
            vec![5.0, 4.0, 3.0, 2.0, 1.0],
        ]).unwrap()
    }

    #[test]
    fn fully_observed_ratings_are_unmasked() {
        let state = ModelState::new(ratings(), None).unwrap();

        assert!(!state.is_mask());
        assert!(!state.is_fit());
        assert!(!state.is_predict());
        assert!(state.masked_ratings().is_none());
        assert_eq!(state.training_ratings(), state.ratings());
    }

    #[test]
    fn missing_cells_define_the_mask() {
        let ratings = RatingsMatrix::from_rows(vec![vec![1.0, NAN], vec![NAN, 4.0]]).unwrap();
        let state = ModelState::new(ratings, None).unwrap();

        assert!(state.is_mask());
        assert_eq!(state.train_mask().unwrap().count_per_subject(), vec![1, 1]);
        assert!(!state.train_mask().unwrap().values()[[0, 1]]);
    }

    #[test]
    fn rejects_foreign_mask_and_infinite_ratings() {
        let mask = Mask::from_rows(vec![vec![true, false]]).unwrap();
        assert!(matches!(ModelState::new(ratings(), Some(mask)), Err(CfError::Construction(_))));

        let infinite = RatingsMatrix::from_rows(vec![vec![1.0, std::f64::INFINITY]]).unwrap();
        assert!(matches!(ModelState::new(infinite, None), Err(CfError::Construction(_))));
    }

    #[test]
    fn split_marks_exactly_n_items_per_subject() {
        let state = ModelState::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for n_train_items in 1..=5 {
            let split = state.with_split(n_train_items, &mut rng).unwrap();
            let mask = split.train_mask().unwrap();

            assert!(mask.same_labels(split.ratings()));
            assert_eq!(mask.count_per_subject(), vec![n_train_items; 3]);

            let masked = split.masked_ratings().unwrap();
            assert_eq!(masked.values().iter().filter(|value| !value.is_nan()).count(),
                3 * n_train_items);
        }
    }

    #[test]
    fn split_rejects_out_of_range_counts() {
        let state = ModelState::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        assert!(matches!(state.with_split(0, &mut rng), Err(CfError::InvalidArgument { .. })));
        assert!(matches!(state.with_split(6, &mut rng), Err(CfError::InvalidArgument { .. })));
        assert!(!state.is_mask());
    }

    #[test]
    fn split_is_reproducible_with_seed() {
        let state = ModelState::new(ratings(), None).unwrap();

        let first = state.with_split(2, &mut StdRng::seed_from_u64(7)).unwrap();
        let second = state.with_split(2, &mut StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(first.train_mask(), second.train_mask());
    }

    #[test]
    fn dilation_requires_mask() {
        let state = ModelState::new(ratings(), None).unwrap();
        assert!(matches!(state.with_dilation(3), Err(CfError::NoMask)));
    }

    #[test]
    fn dilation_never_shrinks_coverage() {
        let state = ModelState::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let split = state.with_split(2, &mut rng).unwrap();
        let dilated = split.with_dilation(3).unwrap();

        assert!(dilated.is_mask_dilated());

        let before = split.train_mask().unwrap().count_per_subject();
        let after = dilated.dilated_mask().unwrap().count_per_subject();

        for (b, a) in before.iter().zip(after.iter()) {
            assert!(a >= b);
        }

        assert_eq!(dilated.training_mask(), dilated.dilated_mask());
        assert_eq!(dilated.train_mask(), split.train_mask());
    }

    #[test]
    fn dilation_averages_neighbouring_ratings() {
        let ratings = RatingsMatrix::from_rows(vec![vec![2.0, NAN, 4.0, NAN, NAN, NAN]]).unwrap();
        let state = ModelState::new(ratings, None).unwrap();

        let dilated = state.with_dilation(3).unwrap();
        let masked = dilated.masked_ratings().unwrap();

        assert_eq!(masked.get(0, 1), 3.0);
        assert_eq!(masked.get(0, 3), 4.0);
        assert!(masked.get(0, 4).is_nan());
        assert_eq!(dilated.dilated_mask().unwrap().count(), 4);
    }

    #[test]
    fn repeated_dilation_dilates_again() {
        let ratings = RatingsMatrix::from_rows(vec![vec![1.0, NAN, NAN, NAN, NAN, NAN]]).unwrap();
        let state = ModelState::new(ratings, None).unwrap();

        let once = state.with_dilation(3).unwrap();
        let twice = once.with_dilation(3).unwrap();

        assert_eq!(once.dilated_mask().unwrap().count(), 2);
        assert_eq!(twice.dilated_mask().unwrap().count(), 3);
    }

    #[test]
    fn downsample_bins_every_table() {
        let state = ModelState::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let split = state.with_split(3, &mut rng).unwrap();

        let downsampled = split.with_downsample(10.0, 2.0, TargetType::Samples).unwrap();

        assert_eq!(downsampled.ratings().shape(), (3, 3));
        assert_eq!(downsampled.train_mask().unwrap().shape(), (3, 3));
        assert_eq!(downsampled.masked_ratings().unwrap().shape(), (3, 3));
        assert!(downsampled.train_mask().unwrap().same_labels(downsampled.ratings()));

        assert_eq!(downsampled.ratings().items(), &["0", "2", "4"]);
        assert_eq!(downsampled.ratings().get(0, 0), 1.5);
        assert_eq!(downsampled.ratings().get(2, 2), 1.0);
    }

    #[test]
    fn downsample_rejects_bad_arguments() {
        let state = ModelState::new(ratings(), None).unwrap();

        assert!(state.with_downsample(0.0, 2.0, TargetType::Samples).is_err());
        assert!(state.with_downsample(10.0, 0.0, TargetType::Seconds).is_err());
    }
}
