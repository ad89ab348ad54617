use std::time::Duration;

use ndarray::{Array2, Axis};

pub fn to_millis(duration: Duration) -> u64 {
    (duration.as_secs() * 1_000) + (duration.subsec_nanos() / 1_000_000) as u64
}

/// Replaces missing cells by zero.
pub fn zero_filled(values: &Array2<f64>) -> Array2<f64> {
    values.mapv(|value| if value.is_nan() { 0.0 } else { value })
}

/// Mean of the observed values of each column, `NaN` for columns without any.
pub fn nan_mean_columns(values: &Array2<f64>) -> Vec<f64> {
    values.axis_iter(Axis(1))
        .map(|column| {
            let (sum, count) = column.iter()
                .filter(|value| !value.is_nan())
                .fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));

            if count == 0 { std::f64::NAN } else { sum / count as f64 }
        })
        .collect()
}
