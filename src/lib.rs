//! Collaborative filtering for imputing missing subject-by-item ratings, e.g. emotion ratings of
//! many subjects over the time points of a stimulus.
//!
//! Every model owns its ratings, an optional training mask and its predictions. Models learn from
//! the training cells only, predict every cell, and are evaluated against the observed ratings on
//! all, the training or the held-out cells.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[cfg(test)]
#[macro_use]
extern crate approx;

pub mod errors;
pub mod types;
pub mod stats;
pub mod utils;
pub mod temporal;
pub mod base;
pub mod evaluation;
pub mod model;
pub mod similarity;
pub mod mean;
pub mod knn;
pub mod nnmf;
pub mod sgd;
pub mod io;


pub use crate::base::ModelState;
pub use crate::errors::{CfError, Result};
pub use crate::evaluation::DataSplit;
pub use crate::knn::{Knn, KnnParams, KnnPredictParams, Normalization};
pub use crate::mean::{Mean, MeanParams};
pub use crate::model::{CollaborativeFilter, FitReport};
pub use crate::nnmf::{NnmfMultiplicative, NnmfParams, StopRule};
pub use crate::sgd::{NnmfSgd, SgdParams};
pub use crate::similarity::SimilarityMetric;
pub use crate::temporal::TargetType;
pub use crate::types::{Mask, RatingsMatrix, Table};
