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

#[macro_use]
extern crate log;

use std::env;
use std::error::Error;
use std::fmt::Display;
use std::process;
use std::str::FromStr;

use getopts::{Matches, Options};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use ratereco::io;
use ratereco::{CollaborativeFilter, DataSplit, Knn, KnnParams, KnnPredictParams, Mean, MeanParams,
    NnmfMultiplicative, NnmfParams, NnmfSgd, SgdParams, SimilarityMetric};

/// Settings shared by all models.
struct Settings {
    n_train_items: Option<usize>,
    seed: u64,
    output_path: Option<String>,
}

fn main() {

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name (required). The input is a CSV file with a \
        header row of item labels and one row of ratings per subject, starting with the subject \
        label. Empty, NaN and NA cells are missing ratings.", "PATH");
    opts.optflag("l", "long", "The input file contains subject,item,rating triples instead.");
    opts.optopt("m", "model", "Model to fit: mean, knn, nnmf or sgd (optional, defaults to \
        mean).", "NAME");
    opts.optopt("t", "n-train-items", "Randomly select this many training items per subject and \
        hold out the rest (optional, all observed ratings are used for training by default).",
        "NUMBER");
    opts.optopt("s", "seed", "Seed for the random number generator (optional, defaults to 0).",
        "NUMBER");
    opts.optopt("", "metric", "Similarity metric of the knn model: pearson, spearman, kendall, \
        correlation or cosine (optional, defaults to pearson).", "NAME");
    opts.optopt("k", "num-neighbours", "Number of neighbours of the knn model (optional, all \
        subjects by default).", "NUMBER");
    opts.optopt("f", "num-factors", "Number of latent factors of the nnmf and sgd models \
        (optional, defaults to the number of items).", "NUMBER");
    opts.optopt("n", "num-iterations", "Number of iterations of the nnmf and sgd models \
        (optional, defaults to 100 for nnmf and 10 for sgd).", "NUMBER");
    opts.optopt("d", "dilate", "Dilate the training ratings by this many samples before fitting \
        (optional, requires --n-train-items).", "NUMBER");
    opts.optopt("o", "outputfile", "Write observed and predicted ratings in long format as JSON \
        to this file (optional).", "PATH");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    let ratings_path = match matches.opt_str("i") {
        Some(path) => path,
        None => return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify an inputfile via --inputfile."),
        ),
    };

    if let Err(failure) = run(&ratings_path, &matches) {
        eprintln!("\n{}\n", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
    process::exit(if hint.is_some() { 2 } else { 0 });
}

fn option<T>(matches: &Matches, name: &str) -> Result<Option<T>, Box<dyn Error>>
    where T: FromStr, T::Err: Display {

    matches.opt_get(name)
        .map_err(|failure: T::Err| format!("Problem with option '{}': {}", name, failure).into())
}

fn run(ratings_path: &str, matches: &Matches) -> Result<(), Box<dyn Error>> {

    println!("Reading ratings from {}", ratings_path);

    let ratings = if matches.opt_present("l") {
        io::read_long_ratings(ratings_path)?
    } else {
        io::read_ratings(ratings_path)?
    };

    println!("Found ratings of {} subjects for {} items.", ratings.num_subjects(), ratings.num_items());

    let settings = Settings {
        n_train_items: option(matches, "t")?,
        seed: option(matches, "s")?.unwrap_or(0),
        output_path: matches.opt_str("o"),
    };

    let dilate_ts_n_samples: Option<usize> = option(matches, "d")?;
    let n_factors: Option<usize> = option(matches, "f")?;
    let n_iterations: Option<usize> = option(matches, "n")?;

    let model_name = matches.opt_str("m").unwrap_or_else(|| String::from("mean"));

    match model_name.as_str() {
        "mean" => {
            let params = MeanParams { dilate_ts_n_samples };
            impute(Mean::new(ratings, None)?, &params, &(), &settings)
        },
        "knn" => {
            let metric: Option<SimilarityMetric> = option(matches, "metric")?;
            let params = KnnParams { metric: metric.unwrap_or_default(), dilate_ts_n_samples };
            let predict_params = KnnPredictParams { k: option(matches, "k")?, ..KnnPredictParams::default() };
            impute(Knn::new(ratings, None)?, &params, &predict_params, &settings)
        },
        "nnmf" => {
            let defaults = NnmfParams::default();
            let params = NnmfParams {
                n_factors,
                max_iterations: n_iterations.unwrap_or(defaults.max_iterations),
                dilate_ts_n_samples,
                ..defaults
            };
            impute(NnmfMultiplicative::new(ratings, None)?, &params, &(), &settings)
        },
        "sgd" => {
            let defaults = SgdParams::default();
            let params = SgdParams {
                n_factors,
                n_iterations: n_iterations.unwrap_or(defaults.n_iterations),
                dilate_ts_n_samples,
                ..defaults
            };
            impute(NnmfSgd::new(ratings, None)?, &params, &(), &settings)
        },
        other => Err(format!("Unknown model '{}', must be mean, knn, nnmf or sgd.", other).into()),
    }
}

fn impute<M>(
    mut model: M,
    fit_params: &M::FitParams,
    predict_params: &M::PredictParams,
    settings: &Settings,
) -> Result<(), Box<dyn Error>>
    where M: CollaborativeFilter + Display {

    let mut rng = StdRng::seed_from_u64(settings.seed);

    if let Some(n_train_items) = settings.n_train_items {
        model.split_train_test(n_train_items, &mut rng)?;
    }

    println!("Fitting {}", model);
    let report = model.fit(fit_params, &mut rng)?;
    model.predict_with(predict_params)?;

    let mut mse = serde_json::Map::new();
    let mut corr = serde_json::Map::new();

    for &data in &[DataSplit::All, DataSplit::Training, DataSplit::Test] {
        match (model.get_mse(data), model.get_corr(data)) {
            (Ok(data_mse), Ok(data_corr)) => {
                mse.insert(data.to_string(), json!(data_mse));
                corr.insert(data.to_string(), json!(data_corr));
            },
            (Err(failure), _) | (_, Err(failure)) => {
                warn!("Cannot evaluate the {} data: {}", data, failure);
            },
        }
    }

    let summary = json!({
        "model": model.to_string(),
        "iterations": report.iterations,
        "fit_residual": report.fit_residual,
        "elapsed_ms": report.elapsed_ms,
        "mse": mse,
        "corr": corr,
    });

    println!("{}", summary);

    if let Some(output_path) = settings.output_path.clone() {
        println!("Writing observed and predicted ratings to {}", output_path);
        let records = io::to_long_format(model.state());
        io::write_long_format(&records, Some(output_path))?;
    }

    Ok(())
}
