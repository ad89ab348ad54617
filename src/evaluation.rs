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
use std::str::FromStr;

use ndarray::Array2;

use crate::base::ModelState;
use crate::errors::{self, CfError, Result};
use crate::similarity;
use crate::types::RatingsMatrix;

/// Which cells to compare predictions against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSplit {
    All,
    Training,
    Test,
}

impl fmt::Display for DataSplit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            DataSplit::All => "all",
            DataSplit::Training => "training",
            DataSplit::Test => "test",
        })
    }
}

impl FromStr for DataSplit {
    type Err = CfError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "all" => Ok(DataSplit::All),
            "training" => Ok(DataSplit::Training),
            "test" => Ok(DataSplit::Test),
            _ => errors::invalid_argument("data", format!("'{}', must be all, training or test", name)),
        }
    }
}

/// Actual and predicted values of the selected cells of one subject, in item order. Either side
/// may be missing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Comparison {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl Comparison {

    /// Drops the pairs where either side is missing.
    pub fn complete(&self) -> Comparison {
        let (actual, predicted) = self.actual.iter()
            .zip(self.predicted.iter())
            .filter(|&(a, p)| !a.is_nan() && !p.is_nan())
            .map(|(a, p)| (*a, *p))
            .unzip();

        Comparison { actual, predicted }
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    /// Mean squared error over the complete pairs, `NaN` if there are none.
    pub fn mse(&self) -> f64 {
        let complete = self.complete();
        if complete.is_empty() {
            return std::f64::NAN;
        }

        let sum: f64 = complete.actual.iter()
            .zip(complete.predicted.iter())
            .map(|(a, p)| (p - a) * (p - a))
            .sum();

        sum / complete.len() as f64
    }

    /// Pearson correlation over the complete pairs, `NaN` when it is undefined.
    pub fn corr(&self) -> f64 {
        let complete = self.complete();
        similarity::pearson(&complete.actual, &complete.predicted)
    }

    fn extend(&mut self, other: Comparison) {
        self.actual.extend(other.actual);
        self.predicted.extend(other.predicted);
    }
}

impl ModelState {

    fn ensure_predicted(&self) -> Result<&RatingsMatrix> {
        if !self.is_fit() {
            return Err(CfError::NotFit);
        }
        self.predicted_ratings().ok_or(CfError::NotPredicted)
    }

    /// The ratings to compare against and the cells to compare.
    fn universe(&self, data: DataSplit) -> Result<(&RatingsMatrix, Array2<bool>)> {
        match (data, self.train_mask(), self.masked_ratings()) {
            (DataSplit::All, Some(train_mask), Some(masked_ratings)) => {
                let mask = self.dilated_mask().unwrap_or(train_mask);
                Ok((masked_ratings, mask.values().clone()))
            },
            (DataSplit::All, _, _) => {
                let ratings = self.ratings();
                Ok((ratings, Array2::from_elem(ratings.shape(), true)))
            },
            (DataSplit::Training, Some(train_mask), Some(masked_ratings)) =>
                Ok((masked_ratings, train_mask.values().clone())),
            (DataSplit::Test, Some(train_mask), _) =>
                Ok((self.ratings(), train_mask.complement().into_values())),
            _ => Err(CfError::MissingSplit),
        }
    }

    /// The (actual, predicted) pairs of the selected cells, one comparison per subject. For the
    /// test partition, cells are compared against the full ratings, so held out ratings never
    /// leak into the training comparisons and vice versa.
    pub fn retrieve_subject_predictions(&self, data: DataSplit) -> Result<Vec<Comparison>> {

        let predicted_ratings = self.ensure_predicted()?;
        let (actual_ratings, selected) = self.universe(data)?;

        let comparisons: Vec<Comparison> = selected.outer_iter()
            .zip(actual_ratings.values().outer_iter())
            .zip(predicted_ratings.values().outer_iter())
            .map(|((cells, actual), predicted)| {
                let mut comparison = Comparison::default();
                for (item, &keep) in cells.iter().enumerate() {
                    if keep {
                        comparison.actual.push(actual[item]);
                        comparison.predicted.push(predicted[item]);
                    }
                }
                comparison
            })
            .collect();

        if data == DataSplit::Test {
            let no_actual = comparisons.iter()
                .all(|comparison| comparison.actual.iter().all(|value| value.is_nan()));
            let no_pairs = comparisons.iter().all(|comparison| comparison.complete().is_empty());

            if no_actual || no_pairs {
                return Err(CfError::NoTestData);
            }
        }

        Ok(comparisons)
    }

    /// All selected (actual, predicted) pairs, in row-major order.
    pub fn retrieve_predictions(&self, data: DataSplit) -> Result<Comparison> {
        let mut all = Comparison::default();
        for comparison in self.retrieve_subject_predictions(data)? {
            all.extend(comparison);
        }
        Ok(all)
    }

    pub fn get_mse(&self, data: DataSplit) -> Result<f64> {
        Ok(self.retrieve_predictions(data)?.mse())
    }

    pub fn get_corr(&self, data: DataSplit) -> Result<f64> {
        Ok(self.retrieve_predictions(data)?.corr())
    }

    /// One mean squared error per subject.
    pub fn get_sub_mse(&self, data: DataSplit) -> Result<Vec<f64>> {
        Ok(self.retrieve_subject_predictions(data)?.iter().map(Comparison::mse).collect())
    }

    /// One correlation per subject, subjects without variance in either series get `NaN`.
    pub fn get_sub_corr(&self, data: DataSplit) -> Result<Vec<f64>> {
        Ok(self.retrieve_subject_predictions(data)?.iter().map(Comparison::corr).collect())
    }
}


#[cfg(test)]
mod tests {

    use crate::base::ModelState;
    use crate::errors::CfError;
    use crate::evaluation::{Comparison, DataSplit};
    use crate::types::{Mask, RatingsMatrix};

    const NAN: f64 = std::f64::NAN;

    fn predicted_state(mask: Option<Mask>, predictions: Vec<Vec<f64>>) -> ModelState {
        let ratings = RatingsMatrix::from_rows(vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
        ]).unwrap();

        let mut state = ModelState::new(ratings, mask).unwrap().into_fitted();
        state.set_predictions(RatingsMatrix::from_rows(predictions).unwrap());
        state
    }

    #[test]
    fn comparison_drops_incomplete_pairs() {
        let comparison = Comparison {
            actual: vec![1.0, NAN, 3.0, 4.0],
            predicted: vec![2.0, 2.0, NAN, 4.0],
        };

        assert_eq!(comparison.complete().len(), 2);
        assert_eq!(comparison.mse(), 0.5);
        assert!(Comparison::default().mse().is_nan());
    }

    #[test]
    fn requires_fit_then_predict() {
        let ratings = RatingsMatrix::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let state = ModelState::new(ratings, None).unwrap();

        assert!(matches!(state.get_mse(DataSplit::All), Err(CfError::NotFit)));

        let fitted = state.into_fitted();
        assert!(matches!(fitted.get_corr(DataSplit::All), Err(CfError::NotPredicted)));
        assert!(matches!(fitted.get_sub_mse(DataSplit::All), Err(CfError::NotPredicted)));
    }

    #[test]
    fn exact_predictions_have_zero_error() {
        let state = predicted_state(None, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

        assert_eq!(state.get_mse(DataSplit::All).unwrap(), 0.0);
        assert!((state.get_corr(DataSplit::All).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(state.get_sub_mse(DataSplit::All).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn training_and_test_need_a_mask() {
        let state = predicted_state(None, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

        assert!(matches!(state.get_mse(DataSplit::Training), Err(CfError::MissingSplit)));
        assert!(matches!(state.get_sub_corr(DataSplit::Test), Err(CfError::MissingSplit)));
    }

    #[test]
    fn partitions_follow_the_train_mask() {
        let mask = Mask::from_rows(vec![
            vec![true, true, false],
            vec![true, false, true],
        ]).unwrap();

        let state = predicted_state(Some(mask), vec![vec![1.0, 2.0, 5.0], vec![4.0, 8.0, 6.0]]);

        assert_eq!(state.get_mse(DataSplit::Training).unwrap(), 0.0);
        assert_eq!(state.get_mse(DataSplit::All).unwrap(), 0.0);

        let test = state.retrieve_predictions(DataSplit::Test).unwrap();
        assert_eq!(test.actual, vec![3.0, 5.0]);
        assert_eq!(test.predicted, vec![5.0, 8.0]);
        assert_eq!(state.get_mse(DataSplit::Test).unwrap(), 6.5);
        assert_eq!(state.get_sub_mse(DataSplit::Test).unwrap(), vec![4.0, 9.0]);
    }

    #[test]
    fn per_subject_correlation_can_be_undefined() {
        let mask = Mask::from_rows(vec![
            vec![true, true, false],
            vec![true, false, true],
        ]).unwrap();

        let state = predicted_state(Some(mask), vec![vec![1.0, 2.0, 5.0], vec![4.0, 8.0, 6.0]]);
        let sub_corr = state.get_sub_corr(DataSplit::Training).unwrap();

        assert_eq!(sub_corr.len(), 2);
        assert!((sub_corr[0] - 1.0).abs() < 1e-12);
        assert!((sub_corr[1] - 1.0).abs() < 1e-12);

        // single test cell per subject
        assert!(state.get_sub_corr(DataSplit::Test).unwrap().iter().all(|r| r.is_nan()));
    }

    #[test]
    fn empty_test_partition() {
        let mask = Mask::from_rows(vec![vec![true; 3], vec![true; 3]]).unwrap();
        let state = predicted_state(Some(mask), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

        assert!(matches!(state.get_mse(DataSplit::Test), Err(CfError::NoTestData)));
    }

    #[test]
    fn data_split_names() {
        assert_eq!("training".parse::<DataSplit>().unwrap(), DataSplit::Training);
        assert!("validation".parse::<DataSplit>().is_err());
        assert_eq!(DataSplit::Test.to_string(), "test");
    }
}
