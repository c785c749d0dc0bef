//! The two case-study models: batting-ability shrinkage and hierarchical
//! two-parameter logistic item response.
//!
//! Each module exposes `spec()` for the [`ModelSpec`](crate::model::ModelSpec)
//! and `simulate` for a synthetic dataset together with the values that
//! generated it.

pub mod batting;
pub mod irt;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::model::ModelSpec;
use crate::summary::GeneratingValues;

/// A simulated dataset and its generating values.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulated {
    pub data: Dataset,
    pub generating: GeneratingValues,
}

/// The models shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Batting,
    Irt,
}

impl ModelKind {
    pub fn spec(self) -> Result<ModelSpec> {
        let spec = match self {
            ModelKind::Batting => batting::spec()?,
            ModelKind::Irt => irt::spec()?,
        };
        Ok(spec)
    }
}

fn invalid_setting(model: &str, err: impl std::fmt::Display) -> Error {
    Error::Config(format!("invalid {model} simulation settings: {err}"))
}
