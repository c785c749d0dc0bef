//! Configuration of a complete fit, read from TOML, and logging setup.
//!
//! ```toml
//! model = "batting"
//! interval = 0.9
//!
//! [data]
//! source = "simulate"
//! seed = 7
//!
//! [run]
//! num_chains = 4
//! num_iterations = 1000
//! num_warmup = 500
//!
//! [output]
//! draws_csv = "draws.csv"
//! ```

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::RunConfig;
use crate::error::{Error, Result};
use crate::metropolis_hastings::AdaptiveMetropolis;
use crate::models::batting::BattingSimulation;
use crate::models::irt::IrtSimulation;
use crate::models::ModelKind;
use crate::summary::{check_interval, DEFAULT_INTERVAL};

/// Environment variable holding the log level (`error` … `trace`).
pub const LOG_LEVEL_VAR: &str = "PIPELINE_LOG_LEVEL";

/// Where the data to fit come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    /// A JSON object of data fields.
    File { path: PathBuf },
    /// Simulate from the model's simulation settings.
    Simulate { seed: u64 },
    /// The Efron–Morris batting data (batting model only).
    EfronMorris,
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Simulate { seed: 1 }
    }
}

/// Optional output files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Every draw, warm-up included.
    pub draws_csv: Option<PathBuf>,
    /// Diagnostic and comparison reports as JSON.
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub model: ModelKind,
    pub data: DataSource,
    pub run: RunConfig,
    pub sampler: AdaptiveMetropolis,
    pub batting: BattingSimulation,
    pub irt: IrtSimulation,
    /// Credible-interval mass.
    pub interval: f64,
    pub output: OutputConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Batting,
            data: DataSource::default(),
            run: RunConfig::default(),
            sampler: AdaptiveMetropolis::default(),
            batting: BattingSimulation::default(),
            irt: IrtSimulation::default(),
            interval: DEFAULT_INTERVAL,
            output: OutputConfig::default(),
        }
    }
}

impl FromStr for FitConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: FitConfig = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }
}

impl FitConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::read_to_string(path)?.parse()
    }

    fn check(&self) -> Result<()> {
        check_interval(self.interval)?;
        if self.data == DataSource::EfronMorris && self.model != ModelKind::Batting {
            return Err(Error::Config(
                "the Efron-Morris data only fit the batting model".to_string(),
            ));
        }
        if !(self.sampler.target_acceptance > 0.0 && self.sampler.target_acceptance < 1.0) {
            return Err(Error::Config(format!(
                "sampler.target_acceptance must lie strictly between 0 and 1, found {}",
                self.sampler.target_acceptance
            )));
        }
        if !(self.sampler.initial_scale > 0.0) {
            return Err(Error::Config(format!(
                "sampler.initial_scale must be positive, found {}",
                self.sampler.initial_scale
            )));
        }
        Ok(())
    }
}

/// Log level from [`LOG_LEVEL_VAR`], `info` when unset or unparsable.
pub fn log_level() -> LevelFilter {
    std::env::var(LOG_LEVEL_VAR)
        .ok()
        .and_then(|l| LevelFilter::from_str(&l).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Installs the `env_logger` backend. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_module_path(true)
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .filter(None, log_level())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: FitConfig = "".parse().unwrap();
        assert_eq!(config, FitConfig::default());
        assert_eq!(config.run.num_chains, 4);
    }

    #[test]
    fn parses_nested_sections() {
        let config: FitConfig = r#"
            model = "irt"
            interval = 0.9

            [data]
            source = "file"
            path = "responses.json"

            [run]
            num_iterations = 600
            num_warmup = 300
            parallel = false

            [irt]
            num_items = 5

            [output]
            draws_csv = "draws.csv"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.model, ModelKind::Irt);
        assert_eq!(
            config.data,
            DataSource::File {
                path: "responses.json".into()
            }
        );
        assert_eq!(config.run.num_iterations, 600);
        assert!(!config.run.parallel);
        assert_eq!(config.run.num_chains, 4);
        assert_eq!(config.irt.num_items, 5);
        assert_eq!(config.irt.num_persons, 1000);
        assert_eq!(config.output.draws_csv, Some("draws.csv".into()));
        assert_eq!(config.output.report_json, None);
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let err = "interval = 1.5".parse::<FitConfig>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), 1);

        let err = "model = \"irt\"\n[data]\nsource = \"efron_morris\""
            .parse::<FitConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("Efron-Morris"));

        let err = "model = \"poisson\"".parse::<FitConfig>().unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
