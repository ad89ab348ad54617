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

use rand::Rng;

use crate::base::ModelState;
use crate::errors::Result;
use crate::evaluation::DataSplit;
use crate::temporal::TargetType;
use crate::types::{Mask, RatingsMatrix};

/// What a call to `fit()` did.
#[derive(Clone, Debug, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    /// Change of the masked reconstruction in the last iteration, for iterative models only.
    pub fit_residual: Option<f64>,
    pub elapsed_ms: u64,
}

/// The contract shared by all collaborative filtering models: fit on the training view of the
/// ratings, predict every cell, and evaluate the predictions against the ratings.
///
/// Implementors only provide `fit` and `predict_with`, masking, splitting, dilation,
/// downsampling and evaluation all act on the shared [`ModelState`].
pub trait CollaborativeFilter {
    type FitParams;
    type PredictParams: Default;

    fn name(&self) -> &'static str;

    fn state(&self) -> &ModelState;

    fn state_mut(&mut self) -> &mut ModelState;

    /// Learns the model parameters. On error, the model is left exactly as it was.
    fn fit<R: Rng>(&mut self, params: &Self::FitParams, rng: &mut R) -> Result<FitReport>;

    /// Predicts every cell of the ratings matrix.
    fn predict_with(&mut self, params: &Self::PredictParams) -> Result<&RatingsMatrix>;

    fn predict(&mut self) -> Result<&RatingsMatrix> {
        self.predict_with(&Self::PredictParams::default())
    }

    fn split_train_test<R: Rng>(&mut self, n_train_items: usize, rng: &mut R) -> Result<()> {
        let next = self.state().with_split(n_train_items, rng)?;
        *self.state_mut() = next;
        Ok(())
    }

    /// Splits right after construction, e.g. `Mean::new(ratings, None)?.with_train_items(5, rng)?`.
    fn with_train_items<R: Rng>(mut self, n_train_items: usize, rng: &mut R) -> Result<Self>
        where Self: Sized {

        self.split_train_test(n_train_items, rng)?;
        Ok(self)
    }

    /// Dilates the masked ratings by `n_samples` and returns the dilated ratings.
    fn dilate(&mut self, n_samples: usize) -> Result<&RatingsMatrix> {
        let next = self.state().with_dilation(n_samples)?;
        *self.state_mut() = next;
        Ok(self.state().training_ratings())
    }

    fn downsample(&mut self, sampling_freq: f64, target: f64, target_type: TargetType) -> Result<()> {
        let next = self.state().with_downsample(sampling_freq, target, target_type)?;
        *self.state_mut() = next;
        Ok(())
    }

    fn ratings(&self) -> &RatingsMatrix {
        self.state().ratings()
    }

    fn predicted_ratings(&self) -> Option<&RatingsMatrix> {
        self.state().predicted_ratings()
    }

    fn train_mask(&self) -> Option<&Mask> {
        self.state().train_mask()
    }

    fn dilated_mask(&self) -> Option<&Mask> {
        self.state().dilated_mask()
    }

    fn get_mse(&self, data: DataSplit) -> Result<f64> {
        self.state().get_mse(data)
    }

    fn get_corr(&self, data: DataSplit) -> Result<f64> {
        self.state().get_corr(data)
    }

    fn get_sub_mse(&self, data: DataSplit) -> Result<Vec<f64>> {
        self.state().get_sub_mse(data)
    }

    fn get_sub_corr(&self, data: DataSplit) -> Result<Vec<f64>> {
        self.state().get_sub_corr(data)
    }
}
