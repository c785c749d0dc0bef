//! Error taxonomy for every stage of the pipeline.
//!
//! Each stage returns its own error type so callers can tell a malformed
//! model from bad data, a failed run, too little data to diagnose, or
//! mismatched generating values. [`Error`] wraps all of them for callers
//! that drive the whole pipeline (the command-line entry point).

use thiserror::Error;

/// A malformed [`ModelSpec`](crate::model::ModelSpec), detected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("parameter `{name}` has contradictory bounds: lower {lower} must be below upper {upper}")]
    ContradictoryBounds { name: String, lower: f64, upper: f64 },

    #[error("data field `{name}` has contradictory bounds: lower {lower} must not exceed upper {upper}")]
    ContradictoryDataBounds { name: String, lower: f64, upper: f64 },

    #[error("`{name}` has a NaN bound")]
    NanBound { name: String },

    #[error("name `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("`{declared_by}` sizes itself by `{extent}`, which is not a declared integer scalar data field")]
    InvalidExtent { declared_by: String, extent: String },

    #[error("{owner} references undeclared {kind} `{name}`")]
    UndeclaredReference {
        owner: String,
        kind: &'static str,
        name: String,
    },

    #[error("model `{0}` has no log-density")]
    MissingDensity(String),
}

/// A dataset that does not satisfy the declared schema of a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("data field `{0}` is missing")]
    MissingField(String),

    #[error("data field `{field}` must hold {expected} values")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("data field `{field}` must have {expected} elements, found {found}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("data field `{field}` is used as a size and must be non-negative, found {value}")]
    NegativeExtent { field: String, value: i64 },

    #[error("data field `{field}`[{index}] = {value} violates its lower bound {bound}")]
    BelowLower {
        field: String,
        index: usize,
        value: f64,
        bound: f64,
    },

    #[error("data field `{field}`[{index}] = {value} violates its upper bound {bound}")]
    AboveUpper {
        field: String,
        index: usize,
        value: f64,
        bound: f64,
    },

    #[error("data field `{field}`[{index}] = {value} is not finite")]
    NonFinite {
        field: String,
        index: usize,
        value: f64,
    },

    #[error("`{field}`[{index}] = {value} must not exceed `{bound_field}`[{index}] = {bound}")]
    ConstraintViolated {
        field: String,
        bound_field: String,
        index: usize,
        value: f64,
        bound: f64,
    },
}

/// An invalid run configuration, invalid data, or a sampler failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("at least one chain is required")]
    NoChains,

    #[error("warm-up ({warmup}) must be shorter than the total number of iterations ({iterations})")]
    WarmupTooLong { warmup: usize, iterations: usize },

    #[error("refusing to sample against invalid data: {0}")]
    InvalidData(#[from] ValidationError),

    #[error("chain {chain}: no initial point with finite log-density after {attempts} attempts")]
    Initialization { chain: usize, attempts: usize },

    #[error("chain {chain}, iteration {iteration}: parameter `{parameter}` is not finite")]
    NonFinite {
        chain: usize,
        iteration: usize,
        parameter: String,
    },
}

/// Too few chains or draws to compute convergence diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsufficientDataError {
    #[error("diagnostics need at least 2 chains, found {0}")]
    TooFewChains(usize),

    #[error("diagnostics need at least 2 retained draws per chain, chain {chain} has {found}")]
    TooFewDraws { chain: usize, found: usize },
}

/// Generating values that do not line up with the run's parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyMismatchError {
    #[error("generating value `{0}` is not a parameter or generated quantity of this run")]
    Unknown(String),

    #[error("no generating value supplied for parameter `{0}`")]
    Missing(String),

    #[error("generating value `{name}` has {found} elements, the run has {expected}")]
    Shape {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Any failure of the pipeline, as seen by its command-line entry point.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),

    #[error(transparent)]
    KeyMismatch(#[from] KeyMismatchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "csv")]
    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Schema(_) => 2,
            Error::Validation(_) | Error::Sampling(SamplingError::InvalidData(_)) => 3,
            Error::Sampling(_) => 4,
            Error::InsufficientData(_) => 5,
            Error::KeyMismatch(_) => 6,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
