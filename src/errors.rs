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

use thiserror::Error;

/// Everything that can go wrong while building, fitting or evaluating a model. None of these
/// are retried internally, the failing call leaves the model untouched.
#[derive(Debug, Error)]
pub enum CfError {
    #[error("Invalid ratings table: {0}")]
    Construction(String),

    #[error("You must fit() model first before using this method.")]
    NotFit,

    #[error("You must predict() model first before using this method.")]
    NotPredicted,

    #[error("Must run split_train_test() or supply a mask before using this option.")]
    MissingSplit,

    #[error("No test data available. Use data='all' or 'training'.")]
    NoTestData,

    #[error("Make sure the model has been masked before dilating.")]
    NoMask,

    #[error("{metric} is not implemented yet. Try {supported:?}")]
    UnsupportedMetric {
        metric: String,
        supported: &'static [&'static str],
    },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CfError>;

pub(crate) fn invalid_argument<T>(name: &'static str, reason: impl Into<String>) -> Result<T> {
    Err(CfError::InvalidArgument { name, reason: reason.into() })
}
