//! Fits one of the case-study models end to end: load or simulate data, run
//! the chains, print diagnostics and posterior summaries.
//!
//! Usage: `pipeline-fit [config.toml]`. Without a file every setting takes
//! its default (simulated batting data). Set `PIPELINE_LOG_LEVEL` to change
//! the log level.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;

use posterior_pipeline::config::{init_logging, DataSource, FitConfig};
use posterior_pipeline::core::{run_with, RunResult};
use posterior_pipeline::dataset::Dataset;
use posterior_pipeline::models::{batting, irt, ModelKind, Simulated};
use posterior_pipeline::stats::{diagnose, DiagnosticReport};
use posterior_pipeline::summary::{summarize_with, ComparisonReport, GeneratingValues};
use posterior_pipeline::{Error, Result};

#[derive(Serialize)]
struct Report<'a> {
    model: &'a str,
    diagnostics: &'a DiagnosticReport,
    summary: &'a ComparisonReport,
}

fn load_data(config: &FitConfig) -> Result<(Dataset, Option<GeneratingValues>)> {
    match &config.data {
        DataSource::File { path } => {
            log::info!("reading data from {}", path.display());
            Ok((Dataset::from_json_file(path)?, None))
        }
        DataSource::EfronMorris => Ok((batting::efron_morris(), None)),
        DataSource::Simulate { seed } => {
            let mut rng = SmallRng::seed_from_u64(*seed);
            let Simulated { data, generating } = match config.model {
                ModelKind::Batting => batting::simulate(&config.batting, &mut rng)?,
                ModelKind::Irt => irt::simulate(&config.irt, &mut rng)?,
            };
            log::info!("simulated data with seed {seed}");
            Ok((data, Some(generating)))
        }
    }
}

fn fit(config: &FitConfig) -> Result<()> {
    let spec = config.model.spec()?;
    let (data, generating) = load_data(config)?;

    let result = run_with(&config.sampler, &spec, &data, &config.run)?;
    let diagnostics = diagnose(&result, true)?;
    let summary = summarize_with(&result, generating.as_ref(), config.interval)?;

    println!("{}\n", diagnostics.to_table());
    println!("{}", summary.to_table());

    if generating.is_some() {
        for entry in result.layout().entries() {
            let (covered, total) = summary.coverage(&entry.name);
            println!("{}: {covered}/{total} intervals cover the generating value", entry.name);
        }
    }

    if let Some(path) = &config.output.draws_csv {
        save_draws(&result, path)?;
        log::info!("draws written to {}", path.display());
    }
    if let Some(path) = &config.output.report_json {
        let report = Report {
            model: spec.name(),
            diagnostics: &diagnostics,
            summary: &summary,
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &report)?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "csv")]
fn save_draws(result: &RunResult, path: &Path) -> Result<()> {
    posterior_pipeline::io::csv::save_csv(result, path, true)
}

#[cfg(not(feature = "csv"))]
fn save_draws(_result: &RunResult, path: &Path) -> Result<()> {
    Err(Error::Config(format!(
        "cannot write {}: built without the `csv` feature",
        path.display()
    )))
}

fn main() -> ExitCode {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => FitConfig::from_file(&path),
        None => Ok(FitConfig::default()),
    };

    match config.and_then(|config| fit(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            exit_code(&err)
        }
    }
}

fn exit_code(err: &Error) -> ExitCode {
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}
