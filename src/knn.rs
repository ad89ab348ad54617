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

use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use ndarray::Array2;
use rand::Rng;

use crate::base::ModelState;
use crate::errors::{self, CfError, Result};
use crate::model::{CollaborativeFilter, FitReport};
use crate::similarity::{self, ScoredSubject, SimilarityMetric};
use crate::types::{Mask, RatingsMatrix};
use crate::utils;

#[derive(Clone, Debug, Default)]
pub struct KnnParams {
    pub metric: SimilarityMetric,
    /// Dilate the masked ratings by this many samples before fitting.
    pub dilate_ts_n_samples: Option<usize>,
}

/// What the similarity weighted sum of neighbour ratings is divided by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Normalization {
    /// The number of neighbours which rated the item.
    NeighborCount,
    /// The summed absolute similarity of the neighbours which rated the item.
    SimilarityMass,
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization::NeighborCount
    }
}

impl FromStr for Normalization {
    type Err = CfError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "count" => Ok(Normalization::NeighborCount),
            "mass" => Ok(Normalization::SimilarityMass),
            _ => errors::invalid_argument("normalization", format!("'{}', must be count or mass", name)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KnnPredictParams {
    /// Only use the `k` most similar subjects, all of them if not set.
    pub k: Option<usize>,
    pub normalization: Normalization,
}

/// Neighbourhood based collaborative filtering: missing ratings of a subject are the similarity
/// weighted ratings of the most similar other subjects.
#[derive(Clone, Debug)]
pub struct Knn {
    state: ModelState,
    subject_similarity: Option<Array2<f64>>,
}

impl Knn {

    pub fn new(ratings: RatingsMatrix, mask: Option<Mask>) -> Result<Self> {
        Ok(Knn { state: ModelState::new(ratings, mask)?, subject_similarity: None })
    }

    /// The subject-by-subject similarities learned by `fit()`.
    pub fn subject_similarity(&self) -> Option<&Array2<f64>> {
        self.subject_similarity.as_ref()
    }
}

/// The other subjects with a defined similarity, most similar first, at most `k` of them.
pub fn neighbours(similarities: &Array2<f64>, subject: usize, k: Option<usize>) -> Vec<ScoredSubject> {

    let row = similarities.row(subject);
    let candidates = row.iter()
        .enumerate()
        .filter(|&(other, score)| other != subject && !score.is_nan())
        .map(|(other, score)| ScoredSubject { subject: other, score: *score });

    match k {
        Some(k) => {
            let mut heap = BinaryHeap::with_capacity(k);

            for scored in candidates {
                if heap.len() < k {
                    heap.push(scored);
                } else if let Some(mut top) = heap.peek_mut() {
                    if scored < *top {
                        *top = scored;
                    }
                }
            }

            heap.into_sorted_vec()
        },
        None => {
            let mut all: Vec<ScoredSubject> = candidates.collect();
            all.sort();
            all
        },
    }
}

impl CollaborativeFilter for Knn {
    type FitParams = KnnParams;
    type PredictParams = KnnPredictParams;

    fn name(&self) -> &'static str {
        "Knn"
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn fit<R: Rng>(&mut self, params: &KnnParams, _rng: &mut R) -> Result<FitReport> {

        let fit_start = Instant::now();

        let state = match params.dilate_ts_n_samples {
            Some(n_samples) => self.state.with_dilation(n_samples)?,
            None => self.state.clone(),
        };

        let sim = similarity::subject_similarity(state.training_ratings().values(), params.metric);

        let num_undefined = sim.iter().filter(|score| score.is_nan()).count();
        if num_undefined > 0 {
            debug!("{} of {} subject similarities are undefined", num_undefined, sim.len());
        }

        self.state = state.into_fitted();
        self.subject_similarity = Some(sim);

        let elapsed_ms = utils::to_millis(fit_start.elapsed());
        info!("Computed {} subject similarities for {} subjects in {}ms",
            params.metric, self.state.ratings().num_subjects(), elapsed_ms);

        Ok(FitReport { iterations: 0, fit_residual: None, elapsed_ms })
    }

    fn predict_with(&mut self, params: &KnnPredictParams) -> Result<&RatingsMatrix> {

        let sim = match self.subject_similarity {
            Some(ref sim) if self.state.is_fit() => sim,
            _ => return Err(CfError::NotFit),
        };

        if params.k == Some(0) {
            return errors::invalid_argument("k", "need at least one neighbour");
        }

        let ratings = self.state.training_ratings().values();
        let (num_subjects, num_items) = ratings.dim();

        if sim.nrows() != num_subjects {
            return Err(CfError::NotFit);
        }

        let mut predicted = Array2::from_elem((num_subjects, num_items), std::f64::NAN);

        for subject in 0..num_subjects {

            let top_subjects = neighbours(sim, subject, params.k);

            for item in 0..num_items {
                let mut weighted_sum = 0.0;
                let mut weight = 0.0;

                for neighbour in &top_subjects {
                    let rating = ratings[[neighbour.subject, item]];
                    if !rating.is_nan() {
                        weighted_sum += neighbour.score * rating;
                        weight += match params.normalization {
                            Normalization::NeighborCount => 1.0,
                            Normalization::SimilarityMass => neighbour.score.abs(),
                        };
                    }
                }

                if weight > 0.0 {
                    predicted[[subject, item]] = weighted_sum / weight;
                }
            }
        }

        let predicted_ratings = self.state.ratings().relabel(predicted);

        Ok(self.state.set_predictions(predicted_ratings))
    }
}

impl fmt::Display for Knn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (num_subjects, num_items) = self.state.ratings().shape();
        write!(f, "{}(ratings=({}, {}))", self.name(), num_subjects, num_items)
    }
}
