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

// Kernels for ratings which are sampled over time: each subject row is treated as a time
// series, items are consecutive samples.

use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::errors::{self, CfError, Result};

/// How the downsampling target is expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetType {
    Samples,
    Seconds,
    Hz,
}

impl FromStr for TargetType {
    type Err = CfError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "samples" => Ok(TargetType::Samples),
            "seconds" => Ok(TargetType::Seconds),
            "hz" => Ok(TargetType::Hz),
            _ => errors::invalid_argument(
                "target_type",
                format!("'{}', make sure target_type is samples, seconds or hz", name)),
        }
    }
}

/// Converts a downsampling target into the number of consecutive samples per bin.
pub fn samples_per_bin(sampling_freq: f64, target: f64, target_type: TargetType) -> Result<usize> {

    if !(sampling_freq.is_finite() && sampling_freq > 0.0) {
        return errors::invalid_argument(
            "sampling_freq", format!("{} is not a positive frequency", sampling_freq));
    }

    if !(target.is_finite() && target > 0.0) {
        return errors::invalid_argument("target", format!("{} is not a positive target", target));
    }

    let n_samples = match target_type {
        TargetType::Samples => target,
        TargetType::Seconds => target * sampling_freq,
        TargetType::Hz => sampling_freq / target,
    };

    let rounded = n_samples.round();

    if (n_samples - rounded).abs() > 1e-9 || rounded < 1.0 {
        return errors::invalid_argument(
            "target",
            format!("resolves to {} samples per bin, need a whole number of at least one",
                n_samples));
    }

    Ok(rounded as usize)
}

/// Centred moving average over the observed (non-`NaN`) samples of a single series. The window
/// spans `n_samples` positions, `(n_samples - 1) / 2` of them after the centre. Positions whose
/// window holds no observed sample stay missing.
pub fn moving_average_observed(series: ArrayView1<f64>, n_samples: usize) -> Array1<f64> {

    let len = series.len() as isize;
    let width = n_samples as isize;
    let ahead = (width - 1) / 2;

    Array1::from_shape_fn(series.len(), |position| {
        let last = (position as isize + ahead).min(len - 1);
        let first = (position as isize + ahead - (width - 1)).max(0);

        let mut sum = 0.0;
        let mut count = 0_usize;

        for index in first..=last {
            let value = series[index as usize];
            if !value.is_nan() {
                sum += value;
                count += 1;
            }
        }

        if count == 0 { std::f64::NAN } else { sum / count as f64 }
    })
}

/// Applies [`moving_average_observed`] to each row.
pub fn dilate_rows(values: &Array2<f64>, n_samples: usize) -> Array2<f64> {
    let mut dilated = values.clone();
    for (mut target, source) in dilated.outer_iter_mut().zip(values.outer_iter()) {
        target.assign(&moving_average_observed(source, n_samples));
    }
    dilated
}

pub fn num_bins(num_columns: usize, n_samples: usize) -> usize {
    (num_columns + n_samples - 1) / n_samples
}

/// Averages the observed values of each bin of `n_samples` consecutive columns. The trailing
/// columns form a smaller last bin of their own.
pub fn bin_columns(values: &Array2<f64>, n_samples: usize) -> Array2<f64> {
    let (num_rows, num_columns) = values.dim();
    let mut binned = Array2::from_elem((num_rows, num_bins(num_columns, n_samples)), std::f64::NAN);

    for (bin, chunk) in values.axis_chunks_iter(Axis(1), n_samples).enumerate() {
        for (row, series) in chunk.outer_iter().enumerate() {
            let observed: Vec<f64> = series.iter().cloned().filter(|value| !value.is_nan()).collect();
            if !observed.is_empty() {
                binned[[row, bin]] = observed.iter().sum::<f64>() / observed.len() as f64;
            }
        }
    }

    binned
}

/// Binning for boolean tables, a bin is set when its average is above zero.
pub fn bin_flags(values: &Array2<bool>, n_samples: usize) -> Array2<bool> {
    let as_numbers = values.mapv(|flag| if flag { 1.0 } else { 0.0 });
    bin_columns(&as_numbers, n_samples).mapv(|average| average > 0.0)
}

/// Each bin is labelled with the label of its first column.
pub fn bin_labels(labels: &[String], n_samples: usize) -> Vec<String> {
    labels.chunks(n_samples).map(|chunk| chunk[0].clone()).collect()
}


#[cfg(test)]
mod tests {

    use ndarray::array;

    use crate::temporal::{self, TargetType};

    const NAN: f64 = std::f64::NAN;

    fn assert_series_eq(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            if e.is_nan() {
                assert!(a.is_nan(), "expected NaN, got {}", a);
            } else {
                assert!((a - e).abs() < 1e-12, "expected {}, got {}", e, a);
            }
        }
    }

    #[test]
    fn odd_window_is_centred() {
        let series = array![NAN, NAN, 3.0, NAN, NAN, NAN, NAN, 6.0];
        let dilated = temporal::moving_average_observed(series.view(), 3);

        assert_series_eq(dilated.as_slice().unwrap(), &[NAN, 3.0, 3.0, 3.0, NAN, NAN, 6.0, 6.0]);
    }

    #[test]
    fn overlapping_ratings_are_averaged() {
        let series = array![2.0, NAN, 4.0, NAN];
        let dilated = temporal::moving_average_observed(series.view(), 3);

        assert_series_eq(dilated.as_slice().unwrap(), &[2.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn even_window_reaches_further_back() {
        let series = array![1.0, NAN, NAN, 5.0];
        let dilated = temporal::moving_average_observed(series.view(), 2);

        assert_series_eq(dilated.as_slice().unwrap(), &[1.0, 1.0, NAN, 5.0]);
    }

    #[test]
    fn unit_window_changes_nothing() {
        let series = array![1.0, NAN, 3.0];
        let dilated = temporal::moving_average_observed(series.view(), 1);

        assert_series_eq(dilated.as_slice().unwrap(), &[1.0, NAN, 3.0]);
    }

    #[test]
    fn bins_keep_partial_last_bin() {
        let values = array![[1.0, 3.0, 5.0, 7.0, 9.0], [NAN, 2.0, NAN, NAN, 4.0]];
        let binned = temporal::bin_columns(&values, 2);

        assert_eq!(binned.dim(), (2, 3));
        assert_series_eq(binned.row(0).to_vec().as_slice(), &[2.0, 6.0, 9.0]);
        assert_series_eq(binned.row(1).to_vec().as_slice(), &[2.0, NAN, 4.0]);
    }

    #[test]
    fn binned_flags_are_rebinarized() {
        let flags = array![[true, false, false, false, false]];
        let binned = temporal::bin_flags(&flags, 2);

        assert_eq!(binned, array![[true, false, false]]);
    }

    #[test]
    fn bin_labels_use_first_column() {
        let labels: Vec<String> = vec!["a", "b", "c"].into_iter().map(String::from).collect();
        assert_eq!(temporal::bin_labels(&labels, 2), vec!["a", "c"]);
    }

    #[test]
    fn target_conversion() {
        assert_eq!(temporal::samples_per_bin(10.0, 4.0, TargetType::Samples).unwrap(), 4);
        assert_eq!(temporal::samples_per_bin(10.0, 0.5, TargetType::Seconds).unwrap(), 5);
        assert_eq!(temporal::samples_per_bin(10.0, 2.0, TargetType::Hz).unwrap(), 5);

        assert!(temporal::samples_per_bin(10.0, 3.0, TargetType::Hz).is_err());
        assert!(temporal::samples_per_bin(0.0, 3.0, TargetType::Samples).is_err());
        assert!(temporal::samples_per_bin(10.0, -1.0, TargetType::Samples).is_err());
        assert!("minutes".parse::<TargetType>().is_err());
        assert_eq!("hz".parse::<TargetType>().unwrap(), TargetType::Hz);
    }
}
