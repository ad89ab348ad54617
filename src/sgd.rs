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
use rand::seq::SliceRandom;
use rand_distr::Normal;

use crate::base::ModelState;
use crate::errors::{self, CfError, Result};
use crate::model::{CollaborativeFilter, FitReport};
use crate::types::{Mask, RatingsMatrix};
use crate::utils;

#[derive(Clone, Debug)]
pub struct SgdParams {
    /// Number of latent factors, defaults to the number of items.
    pub n_factors: Option<usize>,
    pub item_fact_reg: f64,
    pub user_fact_reg: f64,
    pub item_bias_reg: f64,
    pub user_bias_reg: f64,
    pub learning_rate: f64,
    /// Number of epochs over all training pairs.
    pub n_iterations: usize,
    pub dilate_ts_n_samples: Option<usize>,
}

impl Default for SgdParams {
    fn default() -> Self {
        SgdParams {
            n_factors: None,
            item_fact_reg: 0.0,
            user_fact_reg: 0.0,
            item_bias_reg: 0.0,
            user_bias_reg: 0.0,
            learning_rate: 1e-3,
            n_iterations: 10,
            dilate_ts_n_samples: None,
        }
    }
}

impl SgdParams {

    fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return errors::invalid_argument("learning_rate", "must be positive");
        }

        let regularizers = [
            ("item_fact_reg", self.item_fact_reg),
            ("user_fact_reg", self.user_fact_reg),
            ("item_bias_reg", self.item_bias_reg),
            ("user_bias_reg", self.user_bias_reg),
        ];

        for &(name, value) in regularizers.iter() {
            if !(value >= 0.0) {
                return errors::invalid_argument(name, format!("{} must not be negative", value));
            }
        }

        if self.n_factors == Some(0) {
            return errors::invalid_argument("n_factors", "need at least one factor");
        }

        Ok(())
    }
}

/// Learned latent vectors and biases.
#[derive(Clone, Debug)]
struct Factors {
    user_vecs: Array2<f64>,
    item_vecs: Array2<f64>,
    user_bias: Array1<f64>,
    item_bias: Array1<f64>,
    global_bias: f64,
}

impl Factors {

    fn predict_single(&self, subject: usize, item: usize) -> f64 {
        self.global_bias + self.user_bias[subject] + self.item_bias[item] +
            self.user_vecs.row(subject).dot(&self.item_vecs.row(item))
    }
}

/// Matrix factorization with subject and item biases, learned by stochastic gradient descent
/// over the observed training cells.
#[derive(Clone, Debug)]
pub struct NnmfSgd {
    state: ModelState,
    factors: Option<Factors>,
}

impl NnmfSgd {

    pub fn new(ratings: RatingsMatrix, mask: Option<Mask>) -> Result<Self> {
        Ok(NnmfSgd { state: ModelState::new(ratings, mask)?, factors: None })
    }

    pub fn user_vecs(&self) -> Option<&Array2<f64>> {
        self.factors.as_ref().map(|factors| &factors.user_vecs)
    }

    pub fn item_vecs(&self) -> Option<&Array2<f64>> {
        self.factors.as_ref().map(|factors| &factors.item_vecs)
    }

    pub fn user_bias(&self) -> Option<&Array1<f64>> {
        self.factors.as_ref().map(|factors| &factors.user_bias)
    }

    pub fn item_bias(&self) -> Option<&Array1<f64>> {
        self.factors.as_ref().map(|factors| &factors.item_bias)
    }

    pub fn global_bias(&self) -> Option<f64> {
        self.factors.as_ref().map(|factors| factors.global_bias)
    }

    /// Prediction for a single subject and item.
    pub fn predict_single(&self, subject: usize, item: usize) -> Result<f64> {
        match self.factors {
            Some(ref factors) if self.state.is_fit() => {
                if subject >= factors.user_bias.len() || item >= factors.item_bias.len() {
                    return errors::invalid_argument(
                        "subject/item",
                        format!("({}, {}) is outside of the learned factors", subject, item));
                }
                Ok(factors.predict_single(subject, item))
            },
            _ => Err(CfError::NotFit),
        }
    }
}

impl CollaborativeFilter for NnmfSgd {
    type FitParams = SgdParams;
    type PredictParams = ();

    fn name(&self) -> &'static str {
        "NnmfSgd"
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn fit<R: Rng>(&mut self, params: &SgdParams, rng: &mut R) -> Result<FitReport> {

        let fit_start = Instant::now();

        params.validate()?;

        let state = match params.dilate_ts_n_samples {
            Some(n_samples) => self.state.with_dilation(n_samples)?,
            None => self.state.clone(),
        };

        let (num_subjects, num_items) = state.ratings().shape();
        let n_factors = params.n_factors.unwrap_or(num_items);

        let ratings = state.training_ratings().values();
        let mut training_pairs: Vec<(usize, usize)> = state.training_cells()
            .indexed_iter()
            .filter(|&(_, &cell)| cell)
            .map(|(pair, _)| pair)
            .collect();

        if training_pairs.is_empty() {
            return errors::invalid_argument("ratings", "no observed training ratings to learn from");
        }

        let global_bias = training_pairs.iter().map(|&pair| ratings[pair]).sum::<f64>() /
            training_pairs.len() as f64;

        let normal = Normal::new(0.0, 1.0 / n_factors as f64)
            .map_err(|err| CfError::InvalidArgument { name: "n_factors", reason: err.to_string() })?;

        let mut factors = Factors {
            user_vecs: Array2::from_shape_fn((num_subjects, n_factors), |_| rng.sample(normal)),
            item_vecs: Array2::from_shape_fn((num_items, n_factors), |_| rng.sample(normal)),
            user_bias: Array1::zeros(num_subjects),
            item_bias: Array1::zeros(num_items),
            global_bias,
        };

        let learning_rate = params.learning_rate;

        for epoch in 1..=params.n_iterations {

            training_pairs.shuffle(rng);

            let mut squared_error = 0.0;

            for &(subject, item) in training_pairs.iter() {
                let error = ratings[(subject, item)] - factors.predict_single(subject, item);
                squared_error += error * error;

                factors.user_bias[subject] +=
                    learning_rate * (error - params.user_bias_reg * factors.user_bias[subject]);
                factors.item_bias[item] +=
                    learning_rate * (error - params.item_bias_reg * factors.item_bias[item]);

                let user_update = (&factors.item_vecs.row(item) * error -
                    &factors.user_vecs.row(subject) * params.user_fact_reg) * learning_rate;
                factors.user_vecs.row_mut(subject).scaled_add(1.0, &user_update);

                // Uses the subject vector which was just updated
                let item_update = (&factors.user_vecs.row(subject) * error -
                    &factors.item_vecs.row(item) * params.item_fact_reg) * learning_rate;
                factors.item_vecs.row_mut(item).scaled_add(1.0, &item_update);
            }

            if epoch % 10 == 0 {
                debug!("Epoch {}: training mse {:.4}", epoch, squared_error / training_pairs.len() as f64);
            }
        }

        self.state = state.into_fitted();
        self.factors = Some(factors);

        let elapsed_ms = utils::to_millis(fit_start.elapsed());
        info!("Learned {} factors from {} training ratings in {} epochs, {}ms",
            n_factors, training_pairs.len(), params.n_iterations, elapsed_ms);

        Ok(FitReport { iterations: params.n_iterations, fit_residual: None, elapsed_ms })
    }

    fn predict_with(&mut self, _params: &()) -> Result<&RatingsMatrix> {

        let factors = match self.factors {
            Some(ref factors) if self.state.is_fit() => factors,
            _ => return Err(CfError::NotFit),
        };

        let shape = self.state.ratings().shape();
        if (factors.user_bias.len(), factors.item_bias.len()) != shape {
            return Err(CfError::NotFit);
        }

        let predicted = Array2::from_shape_fn(shape, |(subject, item)| {
            factors.predict_single(subject, item)
        });

        let predicted_ratings = self.state.ratings().relabel(predicted);

        Ok(self.state.set_predictions(predicted_ratings))
    }
}

impl fmt::Display for NnmfSgd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (num_subjects, num_items) = self.state.ratings().shape();
        write!(f, "{}(ratings=({}, {}))", self.name(), num_subjects, num_items)
    }
}
