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

use std::fmt;
use std::time::Instant;

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::base::ModelState;
use crate::errors::{CfError, Result};
use crate::model::{CollaborativeFilter, FitReport};
use crate::types::{Mask, RatingsMatrix};
use crate::utils;

#[derive(Clone, Debug, Default)]
pub struct MeanParams {
    /// Dilate the masked ratings by this many samples before fitting.
    pub dilate_ts_n_samples: Option<usize>,
}

/// Baseline which predicts the mean observed rating of each item, for every subject.
#[derive(Clone, Debug)]
pub struct Mean {
    state: ModelState,
    mean: Option<Array1<f64>>,
}

impl Mean {

    pub fn new(ratings: RatingsMatrix, mask: Option<Mask>) -> Result<Self> {
        Ok(Mean { state: ModelState::new(ratings, mask)?, mean: None })
    }

    /// The item means learned by `fit()`.
    pub fn item_means(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }
}

impl CollaborativeFilter for Mean {
    type FitParams = MeanParams;
    type PredictParams = ();

    fn name(&self) -> &'static str {
        "Mean"
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn fit<R: Rng>(&mut self, params: &MeanParams, _rng: &mut R) -> Result<FitReport> {

        let fit_start = Instant::now();

        let state = match params.dilate_ts_n_samples {
            Some(n_samples) => self.state.with_dilation(n_samples)?,
            None => self.state.clone(),
        };

        let mean = Array1::from(utils::nan_mean_columns(state.training_ratings().values()));

        let num_unrated = mean.iter().filter(|value| value.is_nan()).count();
        if num_unrated > 0 {
            warn!("{} items have no observed training ratings, their mean is undefined", num_unrated);
        }

        self.state = state.into_fitted();
        self.mean = Some(mean);

        let elapsed_ms = utils::to_millis(fit_start.elapsed());
        info!("Fitted item means in {}ms", elapsed_ms);

        Ok(FitReport { iterations: 0, fit_residual: None, elapsed_ms })
    }

    fn predict_with(&mut self, _params: &()) -> Result<&RatingsMatrix> {

        let mean = match self.mean {
            Some(ref mean) if self.state.is_fit() => mean,
            _ => return Err(CfError::NotFit),
        };

        let (num_subjects, num_items) = self.state.ratings().shape();
        if mean.len() != num_items {
            return Err(CfError::NotFit);
        }

        let mut predicted = Array2::zeros((num_subjects, num_items));
        for mut row in predicted.outer_iter_mut() {
            row.assign(mean);
        }

        let predicted_ratings = self.state.ratings().relabel(predicted);

        Ok(self.state.set_predictions(predicted_ratings))
    }
}

impl fmt::Display for Mean {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (num_subjects, num_items) = self.state.ratings().shape();
        write!(f, "{}(ratings=({}, {}))", self.name(), num_subjects, num_items)
    }
}


#[cfg(test)]
mod tests {

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::errors::CfError;
    use crate::evaluation::DataSplit;
    use crate::mean::{Mean, MeanParams};
    use crate::model::CollaborativeFilter;
    use crate::types::{Mask, RatingsMatrix};

    const NAN: f64 = std::f64::NAN;

    fn ratings() -> RatingsMatrix {
        RatingsMatrix::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 3.0, 4.0, 5.0],
            vec![5.0, 4.0, 3.0, 2.0],
        ]).unwrap()
    }

    #[test]
    fn every_row_is_the_column_means() {
        let mut model = Mean::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        model.fit(&MeanParams::default(), &mut rng).unwrap();
        let predicted = model.predict().unwrap().clone();

        assert!(predicted.same_labels(model.ratings()));

        let expected = [8.0 / 3.0, 3.0, 10.0 / 3.0, 11.0 / 3.0];
        for subject in 0..3 {
            for item in 0..4 {
                assert_relative_eq!(predicted.get(subject, item), expected[item], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn predict_before_fit_fails() {
        let mut model = Mean::new(ratings(), None).unwrap();
        assert!(matches!(model.predict(), Err(CfError::NotFit)));
        assert!(matches!(model.get_mse(DataSplit::All), Err(CfError::NotFit)));
    }

    #[test]
    fn single_test_point_with_prediction_gives_undefined_correlation() {
        let mut mask = vec![vec![true; 4]; 3];
        mask[0][3] = false;
        let mask = Mask::from_rows(mask).unwrap();

        let mut model = Mean::new(ratings(), Some(mask)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        model.fit(&MeanParams::default(), &mut rng).unwrap();
        model.predict().unwrap();

        // item 3 is learned from subjects 1 and 2 only
        assert_relative_eq!(model.predicted_ratings().unwrap().get(0, 3), 3.5);
        assert!(model.get_corr(DataSplit::Test).unwrap().is_nan());
        assert_relative_eq!(model.get_mse(DataSplit::Test).unwrap(), 0.25);
    }

    #[test]
    fn single_test_point_without_prediction_has_no_test_data() {
        let ratings = RatingsMatrix::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 3.0, 4.0, NAN],
            vec![5.0, 4.0, 3.0, NAN],
        ]).unwrap();

        let mut mask = vec![vec![true; 4]; 3];
        for row in mask.iter_mut() {
            row[3] = false;
        }
        let mask = Mask::from_rows(mask).unwrap();

        let mut model = Mean::new(ratings, Some(mask)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        model.fit(&MeanParams::default(), &mut rng).unwrap();
        model.predict().unwrap();

        assert!(model.predicted_ratings().unwrap().get(0, 3).is_nan());
        assert!(matches!(model.get_corr(DataSplit::Test), Err(CfError::NoTestData)));
    }

    #[test]
    fn identical_subjects_are_reproduced_exactly() {
        let ratings = RatingsMatrix::from_rows(vec![vec![1.0, 5.0, 2.0], vec![1.0, 5.0, 2.0]])
            .unwrap();

        let mut model = Mean::new(ratings, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        model.fit(&MeanParams::default(), &mut rng).unwrap();
        model.predict().unwrap();

        assert_eq!(model.get_mse(DataSplit::All).unwrap(), 0.0);
    }

    #[test]
    fn dilated_fit_uses_dilated_ratings() {
        let ratings = RatingsMatrix::from_rows(vec![
            vec![1.0, NAN, NAN, NAN],
            vec![NAN, NAN, NAN, 3.0],
        ]).unwrap();

        let mut model = Mean::new(ratings, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let params = MeanParams { dilate_ts_n_samples: Some(3) };
        model.fit(&params, &mut rng).unwrap();

        assert!(model.state().is_mask_dilated());

        let means = model.item_means().unwrap();
        assert_eq!(means[1], 1.0);
        assert_eq!(means[2], 3.0);

        model.predict().unwrap();
        assert_eq!(model.get_mse(DataSplit::All).unwrap(), 0.0);
    }

    #[test]
    fn failed_dilation_leaves_model_unfit() {
        let mut model = Mean::new(ratings(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let params = MeanParams { dilate_ts_n_samples: Some(3) };

        assert!(matches!(model.fit(&params, &mut rng), Err(CfError::NoMask)));
        assert!(!model.state().is_fit());
        assert!(model.item_means().is_none());
    }

    #[test]
    fn display_shows_shape() {
        let model = Mean::new(ratings(), None).unwrap();
        assert_eq!(model.to_string(), "Mean(ratings=(3, 4))");
    }
}
