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

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};

use crate::errors::CfError;

/// Result type used to find the top-k most similar subjects via a binary heap
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ScoredSubject {
    pub subject: usize,
    pub score: f64,
}

/// Ordering for our max-heap, note that we must use a special implementation here as there is no
/// total order on floating point numbers.
fn cmp_reverse(scored_a: &ScoredSubject, scored_b: &ScoredSubject) -> Ordering {
    match scored_a.score.partial_cmp(&scored_b.score) {
        Some(Ordering::Less) => Ordering::Greater,
        Some(Ordering::Greater) => Ordering::Less,
        Some(Ordering::Equal) => Ordering::Equal,
        None => Ordering::Equal
    }
}

impl Eq for ScoredSubject {}

impl Ord for ScoredSubject {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_reverse(self, other)
    }
}

impl PartialOrd for ScoredSubject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_reverse(self, other))
    }
}

/// How to compare the rating vectors of two subjects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimilarityMetric {
    Pearson,
    Spearman,
    Kendall,
    Correlation,
    Cosine,
}

pub const SUPPORTED_METRICS: &[&str] = &["pearson", "spearman", "kendall", "correlation", "cosine"];

impl SimilarityMetric {
    pub fn name(&self) -> &'static str {
        match *self {
            SimilarityMetric::Pearson => "pearson",
            SimilarityMetric::Spearman => "spearman",
            SimilarityMetric::Kendall => "kendall",
            SimilarityMetric::Correlation => "correlation",
            SimilarityMetric::Cosine => "cosine",
        }
    }
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        SimilarityMetric::Pearson
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimilarityMetric {
    type Err = CfError;

    fn from_str(name: &str) -> Result<Self, CfError> {
        match name {
            "pearson" => Ok(SimilarityMetric::Pearson),
            "spearman" => Ok(SimilarityMetric::Spearman),
            "kendall" => Ok(SimilarityMetric::Kendall),
            "correlation" => Ok(SimilarityMetric::Correlation),
            "cosine" => Ok(SimilarityMetric::Cosine),
            _ => Err(CfError::UnsupportedMetric {
                metric: name.to_owned(),
                supported: SUPPORTED_METRICS,
            }),
        }
    }
}

/// The values of both series at the positions where neither is missing.
pub fn overlap(x: ArrayView1<f64>, y: ArrayView1<f64>) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter(|&(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson correlation, `NaN` for fewer than two values or a constant series.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return std::f64::NAN;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;

    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return std::f64::NAN;
    }

    // Clamp round off error
    (covariance / (variance_x.sqrt() * variance_y.sqrt())).max(-1.0).min(1.0)
}

/// Cosine of the angle between both vectors, `NaN` for fewer than two values or a zero vector.
pub fn cosine(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return std::f64::NAN;
    }

    let dot: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let norm_x = x.iter().map(|a| a * a).sum::<f64>().sqrt();
    let norm_y = y.iter().map(|b| b * b).sum::<f64>().sqrt();

    if norm_x == 0.0 || norm_y == 0.0 {
        std::f64::NAN
    } else {
        dot / (norm_x * norm_y)
    }
}

/// One-based ranks, tied values share the average of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;

    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }

        // positions start..end hold ranks start + 1 ..= end
        let rank = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = rank;
        }

        start = end;
    }

    ranks
}

pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return std::f64::NAN;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Kendall's tau-b, which accounts for ties in either series.
pub fn kendall(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || n != y.len() {
        return std::f64::NAN;
    }

    let mut concordant: i64 = 0;
    let mut discordant: i64 = 0;
    let mut ties_x: i64 = 0;
    let mut ties_y: i64 = 0;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];

            if dx == 0.0 {
                ties_x += 1;
            }
            if dy == 0.0 {
                ties_y += 1;
            }

            let sign = dx * dy;
            if sign > 0.0 {
                concordant += 1;
            } else if sign < 0.0 {
                discordant += 1;
            }
        }
    }

    let num_pairs = (n * (n - 1) / 2) as i64;
    let denominator = (((num_pairs - ties_x) * (num_pairs - ties_y)) as f64).sqrt();

    if denominator == 0.0 {
        std::f64::NAN
    } else {
        (concordant - discordant) as f64 / denominator
    }
}

/// Similarity between two subjects over the items both of them rated.
pub fn similarity(metric: SimilarityMetric, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let (x, y) = overlap(x, y);

    match metric {
        SimilarityMetric::Pearson | SimilarityMetric::Correlation => pearson(&x, &y),
        SimilarityMetric::Spearman => spearman(&x, &y),
        SimilarityMetric::Kendall => kendall(&x, &y),
        SimilarityMetric::Cosine => cosine(&x, &y),
    }
}

/// Symmetric subject-by-subject similarity matrix, every pair is computed once and mirrored.
pub fn subject_similarity(ratings: &Array2<f64>, metric: SimilarityMetric) -> Array2<f64> {
    let num_subjects = ratings.nrows();
    let mut sim = Array2::from_elem((num_subjects, num_subjects), std::f64::NAN);

    for a in 0..num_subjects {
        for b in a..num_subjects {
            let score = similarity(metric, ratings.row(a), ratings.row(b));
            sim[[a, b]] = score;
            sim[[b, a]] = score;
        }
    }

    sim
}
