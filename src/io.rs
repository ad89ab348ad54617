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

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::stdout;
use std::path::Path;

use ndarray::Array2;

use crate::base::ModelState;
use crate::errors::{CfError, Result};
use crate::stats::DataDictionary;
use crate::types::{Mask, RatingsMatrix, Table};

/// Reads a CSV input file in wide format: a header row with the item labels (the first header
/// cell is ignored), then one row per subject, starting with the subject label.
pub fn csv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    Ok(reader)
}

fn parse_rating(cell: &str) -> Option<f64> {
    match cell {
        "" | "NaN" | "nan" | "NA" => Some(std::f64::NAN),
        _ => cell.parse::<f64>().ok(),
    }
}

/// Empty, `NaN` and `NA` cells are missing ratings.
pub fn ratings_from_wide<R: Read>(reader: &mut csv::Reader<R>) -> Result<RatingsMatrix> {

    let items: Vec<String> = reader.headers()?.iter().skip(1).map(String::from).collect();

    let mut subjects = Vec::new();
    let mut values = Vec::new();

    for result in reader.records() {
        let record = result?;

        let mut cells = record.iter();
        let subject = cells.next().unwrap_or_default();

        for (item, cell) in cells.enumerate() {
            if item >= items.len() {
                break;
            }
            let rating = parse_rating(cell).ok_or_else(|| CfError::Construction(
                format!("cannot parse rating '{}' of subject '{}'", cell, subject)))?;
            values.push(rating);
        }

        subjects.push(subject.to_owned());
    }

    let values = Array2::from_shape_vec((subjects.len(), items.len()), values)
        .map_err(|error| CfError::Construction(error.to_string()))?;

    Table::new(subjects, items, values)
}

pub fn read_ratings<P: AsRef<Path>>(path: P) -> Result<RatingsMatrix> {
    let mut reader = csv_reader(path)?;
    ratings_from_wide(&mut reader)
}

#[derive(Debug, Deserialize)]
struct LongRating {
    subject: String,
    item: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    rating: Option<f64>,
}

/// Assembles a ratings matrix from `subject,item,rating` rows. Subjects and items are ordered by
/// first appearance, cells without a row are missing.
pub fn ratings_from_long<R: Read>(reader: &mut csv::Reader<R>) -> Result<RatingsMatrix> {

    let mut ratings: Vec<LongRating> = Vec::new();
    for result in reader.deserialize() {
        ratings.push(result?);
    }

    let data_dict = DataDictionary::from_pairs(
        ratings.iter().map(|rating| (rating.subject.as_str(), rating.item.as_str())));

    info!("Found {} ratings of {} subjects for {} items", data_dict.num_ratings(),
        data_dict.num_subjects(), data_dict.num_items());

    let mut values = Array2::from_elem((data_dict.num_subjects(), data_dict.num_items()), std::f64::NAN);
    let mut seen = Array2::from_elem(values.dim(), false);

    for rating in ratings.iter() {
        if let (Some(subject), Some(item)) =
            (data_dict.subject_index(&rating.subject), data_dict.item_index(&rating.item)) {

            if seen[(subject, item)] {
                return Err(CfError::Construction(format!(
                    "subject '{}' rated item '{}' more than once", rating.subject, rating.item)));
            }
            seen[(subject, item)] = true;
            values[(subject, item)] = rating.rating.unwrap_or(std::f64::NAN);
        }
    }

    let (subjects, items) = data_dict.into_labels();

    Table::new(subjects, items, values)
}

pub fn read_long_ratings<P: AsRef<Path>>(path: P) -> Result<RatingsMatrix> {
    let mut reader = csv_reader(path)?;
    ratings_from_long(&mut reader)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Condition {
    Observed,
    Predicted,
}

/// One cell of the long format. Field names will be used in JSON.
#[derive(Debug, PartialEq, Serialize)]
pub struct LongRecord<'a> {
    pub subject: &'a str,
    pub item: &'a str,
    pub rating: Option<f64>,
    pub condition: Condition,
    pub mask: Option<bool>,
}

fn append_records<'a>(
    records: &mut Vec<LongRecord<'a>>,
    ratings: &'a RatingsMatrix,
    condition: Condition,
    mask: Option<&Mask>,
) {
    for ((subject, item), &rating) in ratings.values().indexed_iter() {
        records.push(LongRecord {
            subject: &ratings.subjects()[subject],
            item: &ratings.items()[item],
            rating: if rating.is_nan() { None } else { Some(rating) },
            condition,
            mask: mask.map(|mask| mask.values()[(subject, item)]),
        });
    }
}

/// One record per subject and item with the observed rating, followed by one record per subject
/// and item with the predicted rating if there are predictions. Observed records carry the mask
/// the model learns from, predicted records carry the train mask.
pub fn to_long_format(state: &ModelState) -> Vec<LongRecord<'_>> {

    let (num_subjects, num_items) = state.ratings().shape();
    let mut records = Vec::with_capacity(2 * num_subjects * num_items);

    append_records(&mut records, state.ratings(), Condition::Observed, state.training_mask());

    if let Some(predicted_ratings) = state.predicted_ratings() {
        append_records(&mut records, predicted_ratings, Condition::Predicted, state.train_mask());
    }

    records
}

/// Output the records as JSON, one per line. If an `output_path` is supplied, we write to a file
/// at the specified path, otherwise, we output to stdout.
pub fn write_long_format(records: &[LongRecord], output_path: Option<String>) -> Result<()> {

    let mut out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(io::BufWriter::new(File::create(&Path::new(&path))?)),
        _ => Box::new(stdout())
    };

    for record in records {
        serde_json::to_writer(&mut out, record).map_err(io::Error::from)?;
        writeln!(out)?;
    }

    out.flush()?;

    Ok(())
}
