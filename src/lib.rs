//! Posterior sampling and diagnostics for Bayesian hierarchical models.
//!
//! The pipeline has four forward-only stages:
//!
//! 1. [`model::ModelSpec`]: parameters with domains, a data schema and a
//!    joint log-density, validated against a [`dataset::Dataset`].
//! 2. [`core::run`]: independent, deterministically seeded chains,
//!    collected into a [`core::RunResult`].
//! 3. [`stats::diagnose`]: split R-hat and effective sample size.
//! 4. [`summary::summarize`]: posterior summaries, and recovery of
//!    generating values in simulation studies.
//!
//! [`models`] holds the two case studies: batting-ability shrinkage and a
//! hierarchical two-parameter logistic item response model.
//!
//! ```rust
//! use posterior_pipeline::core::{run, RunConfig};
//! use posterior_pipeline::models::batting;
//! use posterior_pipeline::stats::diagnose;
//! use posterior_pipeline::summary::summarize;
//!
//! let spec = batting::spec().unwrap();
//! let data = batting::efron_morris();
//! let config = RunConfig { num_iterations: 400, num_warmup: 200, ..Default::default() };
//!
//! let result = run(&spec, &data, &config).unwrap();
//! let diagnostics = diagnose(&result, true).unwrap();
//! let summary = summarize(&result, None).unwrap();
//! assert!(diagnostics.get("phi").is_some());
//! assert!(summary.get("theta[0]").unwrap().mean > 0.0);
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod distributions;
pub mod error;
pub mod io;
pub mod metropolis_hastings;
pub mod model;
pub mod models;
pub mod stats;
pub mod summary;
pub mod transform;

pub use crate::core::{run, run_with, RunConfig, RunResult};
pub use crate::error::{Error, Result};
pub use crate::stats::diagnose;
pub use crate::summary::{summarize, summarize_with, GeneratingValues};
