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
use std::time::Instant;

use ndarray::Array2;
use rand::Rng;

use crate::base::ModelState;
use crate::errors::{self, CfError, Result};
use crate::model::{CollaborativeFilter, FitReport};
use crate::types::{Mask, RatingsMatrix};
use crate::utils;

/// Keeps the factors away from zero, where multiplicative updates would get stuck.
const EPS: f64 = 1e-5;

/// When the multiplicative updates stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopRule {
    /// Always run `max_iterations` iterations.
    Fixed,
    /// Stop as soon as `fit_residual < fit_error_limit` or the masked reconstruction error drops
    /// below `error_limit`, after `max_iterations` at the latest.
    EarlyStop,
}

impl Default for StopRule {
    fn default() -> Self {
        StopRule::Fixed
    }
}

impl FromStr for StopRule {
    type Err = CfError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "fixed" => Ok(StopRule::Fixed),
            "early" => Ok(StopRule::EarlyStop),
            _ => errors::invalid_argument("stop_rule", format!("'{}', must be fixed or early", name)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NnmfParams {
    /// Number of latent factors, defaults to the number of items.
    pub n_factors: Option<usize>,
    pub max_iterations: usize,
    pub error_limit: f64,
    pub fit_error_limit: f64,
    pub stop_rule: StopRule,
    pub dilate_ts_n_samples: Option<usize>,
}

impl Default for NnmfParams {
    fn default() -> Self {
        NnmfParams {
            n_factors: None,
            max_iterations: 100,
            error_limit: 1e-6,
            fit_error_limit: 1e-6,
            stop_rule: StopRule::default(),
            dilate_ts_n_samples: None,
        }
    }
}

/// Non-negative matrix factorization `X ~ W Hᵗ` with multiplicative updates, which only
/// account for the reconstruction error of the observed training cells.
///
/// Negative training ratings are rejected with `InvalidArgument` instead of being factorized,
/// a non-negative factorization cannot reconstruct them.
#[derive(Clone, Debug)]
pub struct NnmfMultiplicative {
    state: ModelState,
    /// subjects x factors
    w: Option<Array2<f64>>,
    /// items x factors
    h: Option<Array2<f64>>,
}

impl NnmfMultiplicative {

    pub fn new(ratings: RatingsMatrix, mask: Option<Mask>) -> Result<Self> {
        Ok(NnmfMultiplicative { state: ModelState::new(ratings, mask)?, w: None, h: None })
    }

    pub fn subject_factors(&self) -> Option<&Array2<f64>> {
        self.w.as_ref()
    }

    pub fn item_factors(&self) -> Option<&Array2<f64>> {
        self.h.as_ref()
    }
}

fn random_factors<R: Rng>(num_rows: usize, n_factors: usize, scale: f64, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((num_rows, n_factors), |_| scale * rng.gen::<f64>())
}

fn frobenius_norm(values: &Array2<f64>) -> f64 {
    values.iter().map(|value| value * value).sum::<f64>().sqrt()
}

impl CollaborativeFilter for NnmfMultiplicative {
    type FitParams = NnmfParams;
    type PredictParams = ();

    fn name(&self) -> &'static str {
        "NnmfMultiplicative"
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn fit<R: Rng>(&mut self, params: &NnmfParams, rng: &mut R) -> Result<FitReport> {

        let fit_start = Instant::now();

        let state = match params.dilate_ts_n_samples {
            Some(n_samples) => self.state.with_dilation(n_samples)?,
            None => self.state.clone(),
        };

        let (num_subjects, num_items) = state.ratings().shape();
        let n_factors = params.n_factors.unwrap_or(num_items);

        if n_factors == 0 {
            return errors::invalid_argument("n_factors", "need at least one factor");
        }

        let mask = state.training_cells().mapv(|cell| if cell { 1.0 } else { 0.0 });
        let x = utils::zero_filled(state.training_ratings().values()) * &mask;

        let num_observed = mask.sum();
        if num_observed == 0.0 {
            return errors::invalid_argument("ratings", "no observed training ratings to factorize");
        }
        if x.iter().any(|&value| value < 0.0) {
            return errors::invalid_argument("ratings", "factorization requires non-negative ratings");
        }

        // Initial guesses are uniform in [0, 1), scaled by sqrt(mean(X) / n_factors)
        let scale = (x.sum() / num_observed / n_factors as f64).sqrt();
        let mut w = random_factors(num_subjects, n_factors, scale, rng);
        let mut h = random_factors(num_items, n_factors, scale, rng);

        let xh_numerator = |h: &Array2<f64>| x.dot(h);
        let xtw_numerator = |w: &Array2<f64>| x.t().dot(w);

        let mut x_est_prev = w.dot(&h.t());
        let mut fit_residual = std::f64::NAN;
        let mut iterations = 0;

        while iterations < params.max_iterations {
            iterations += 1;

            let masked_est = &mask * &w.dot(&h.t());
            w = &w * &xh_numerator(&h) / &masked_est.dot(&h);
            w.mapv_inplace(|value| value.max(EPS));

            let masked_est = &mask * &w.dot(&h.t());
            h = &h * &xtw_numerator(&w) / &masked_est.t().dot(&w);
            h.mapv_inplace(|value| value.max(EPS));

            let x_est = w.dot(&h.t());
            fit_residual = frobenius_norm(&(&mask * &(&x_est_prev - &x_est)));
            let total_residual = frobenius_norm(&(&mask * &(&x - &x_est)));
            x_est_prev = x_est;

            if iterations % 10 == 0 {
                debug!("Iteration {}: fit residual {:.4}, total residual {:.4}",
                    iterations, fit_residual, total_residual);
            }

            if params.stop_rule == StopRule::EarlyStop &&
                (fit_residual < params.fit_error_limit || total_residual < params.error_limit) {
                break;
            }
        }

        self.state = state.into_fitted();
        self.w = Some(w);
        self.h = Some(h);

        let elapsed_ms = utils::to_millis(fit_start.elapsed());
        info!("Factorized with {} factors in {} iterations, fit residual {}, {}ms",
            n_factors, iterations, fit_residual, elapsed_ms);

        Ok(FitReport {
            iterations,
            fit_residual: if iterations > 0 { Some(fit_residual) } else { None },
            elapsed_ms,
        })
    }

    fn predict_with(&mut self, _params: &()) -> Result<&RatingsMatrix> {

        let predicted = match (&self.w, &self.h) {
            (Some(w), Some(h)) if self.state.is_fit() => w.dot(&h.t()),
            _ => return Err(CfError::NotFit),
        };

        if predicted.dim() != self.state.ratings().shape() {
            return Err(CfError::NotFit);
        }

        let predicted_ratings = self.state.ratings().relabel(predicted);

        Ok(self.state.set_predictions(predicted_ratings))
    }
}

impl fmt::Display for NnmfMultiplicative {
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
    use crate::model::CollaborativeFilter;
    use crate::nnmf::{NnmfMultiplicative, NnmfParams, StopRule};
    use crate::types::{Mask, RatingsMatrix};

    fn rank_one() -> RatingsMatrix {
        let u = [1.0, 2.0, 3.0];
        let v = [1.0, 2.0, 3.0, 4.0];
        RatingsMatrix::from_rows(
            u.iter().map(|a| v.iter().map(|b| a * b).collect()).collect()
        ).unwrap()
    }

    #[test]
    fn rank_one_matrix_is_reconstructed() {
        let mut model = NnmfMultiplicative::new(rank_one(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(17);

        let params = NnmfParams { n_factors: Some(1), ..NnmfParams::default() };
        let report = model.fit(&params, &mut rng).unwrap();

        assert_eq!(report.iterations, 100);
        assert!(report.fit_residual.unwrap() < params.fit_error_limit);

        let predicted = model.predict().unwrap().clone();
        assert!(predicted.same_labels(model.ratings()));

        for subject in 0..3 {
            for item in 0..4 {
                assert!((predicted.get(subject, item) - rank_one().get(subject, item)).abs() < 1e-3);
            }
        }

        assert!(model.get_mse(DataSplit::All).unwrap() < 1e-6);
        assert!(model.subject_factors().unwrap().iter().all(|&value| value > 0.0));
    }

    #[test]
    fn early_stop_ends_before_max_iterations() {
        let mut model = NnmfMultiplicative::new(rank_one(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(17);

        let params = NnmfParams {
            n_factors: Some(1),
            stop_rule: StopRule::EarlyStop,
            ..NnmfParams::default()
        };
        let report = model.fit(&params, &mut rng).unwrap();

        assert!(report.iterations < 100);
    }

    #[test]
    fn factors_default_to_number_of_items() {
        let mut model = NnmfMultiplicative::new(rank_one(), None).unwrap();
        let mut rng = StdRng::seed_from_u64(17);

        let params = NnmfParams { max_iterations: 5, ..NnmfParams::default() };
        model.fit(&params, &mut rng).unwrap();

        assert_eq!(model.subject_factors().unwrap().dim(), (3, 4));
        assert_eq!(model.item_factors().unwrap().dim(), (4, 4));
    }

    #[test]
    fn held_out_cells_are_predicted() {
        let mut mask = vec![vec![true; 4]; 3];
        mask[1][2] = false;
        let mask = Mask::from_rows(mask).unwrap();

        let mut model = NnmfMultiplicative::new(rank_one(), Some(mask)).unwrap();
        let mut rng = StdRng::seed_from_u64(23);

        let params = NnmfParams { n_factors: Some(1), max_iterations: 500, ..NnmfParams::default() };
        model.fit(&params, &mut rng).unwrap();
        model.predict().unwrap();

        assert!(model.get_mse(DataSplit::Training).unwrap() < 1e-6);
        assert!(!model.predicted_ratings().unwrap().get(1, 2).is_nan());
        assert!(model.get_mse(DataSplit::Test).unwrap() < 1e-3);
    }

    #[test]
    fn negative_ratings_are_rejected() {
        let ratings = RatingsMatrix::from_rows(vec![vec![1.0, -2.0], vec![3.0, 4.0]]).unwrap();
        let mut model = NnmfMultiplicative::new(ratings, None).unwrap();
        let mut rng = StdRng::seed_from_u64(17);

        let result = model.fit(&NnmfParams::default(), &mut rng);
        assert!(matches!(result, Err(CfError::InvalidArgument { .. })));
        assert!(!model.state().is_fit());
    }

    #[test]
    fn same_seed_same_factors() {
        let params = NnmfParams { n_factors: Some(2), max_iterations: 10, ..NnmfParams::default() };

        let mut first = NnmfMultiplicative::new(rank_one(), None).unwrap();
        first.fit(&params, &mut StdRng::seed_from_u64(3)).unwrap();

        let mut second = NnmfMultiplicative::new(rank_one(), None).unwrap();
        second.fit(&params, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(first.subject_factors(), second.subject_factors());
        assert_eq!(first.item_factors(), second.item_factors());
    }
}
