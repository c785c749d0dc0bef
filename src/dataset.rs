//! Observed data handed to a model.
//!
//! A [`Dataset`] is an immutable map from field name to [`DataValue`]. It is
//! built once (with the consuming `with_*` methods or from JSON) and then only
//! read; [`ModelSpec::validate`](crate::model::ModelSpec::validate) checks it
//! against a model's declared schema before any sampling happens.
//!
//! Matrices are stored flat in row-major order, so `y[i, j]` of an `I × J`
//! field lives at index `i * J + j`.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One data field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Int(i64),
    Real(f64),
    Ints(Vec<i64>),
    Reals(Vec<f64>),
}

impl DataValue {
    /// Number of elements (1 for scalars).
    pub fn len(&self) -> usize {
        match self {
            DataValue::Int(_) | DataValue::Real(_) => 1,
            DataValue::Ints(v) => v.len(),
            DataValue::Reals(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, DataValue::Int(_) | DataValue::Real(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataValue::Int(_) | DataValue::Ints(_))
    }

    /// Element `i` widened to `f64`.
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match self {
            DataValue::Int(v) if i == 0 => Some(*v as f64),
            DataValue::Real(v) if i == 0 => Some(*v),
            DataValue::Ints(v) => v.get(i).map(|x| *x as f64),
            DataValue::Reals(v) => v.get(i).copied(),
            _ => None,
        }
    }
}

/// Immutable, name-keyed observed data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    fields: BTreeMap<String, DataValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: DataValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_int(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, DataValue::Int(value))
    }

    pub fn with_real(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, DataValue::Real(value))
    }

    pub fn with_ints(self, name: impl Into<String>, values: Vec<i64>) -> Self {
        self.with(name, DataValue::Ints(values))
    }

    pub fn with_reals(self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.with(name, DataValue::Reals(values))
    }

    /// Reads a dataset from a JSON object of `name: value` pairs.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Integer scalar `name`, if present and integral.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(DataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Real scalar `name`; integer scalars are widened.
    pub fn real(&self, name: &str) -> Option<f64> {
        match self.fields.get(name) {
            Some(DataValue::Real(v)) => Some(*v),
            Some(DataValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer array `name`.
    ///
    /// Returns an empty slice when the field is absent or not an integer
    /// array; a validated dataset always has the declared fields.
    pub fn ints(&self, name: &str) -> &[i64] {
        match self.fields.get(name) {
            Some(DataValue::Ints(v)) => v,
            _ => &[],
        }
    }

    /// Real array `name`; integer arrays are widened.
    ///
    /// JSON arrays of whole numbers load as [`DataValue::Ints`] even when
    /// the field is declared real, so both variants are read here. Returns
    /// an empty slice when the field is absent or scalar.
    pub fn reals(&self, name: &str) -> Cow<'_, [f64]> {
        match self.fields.get(name) {
            Some(DataValue::Reals(v)) => Cow::Borrowed(v),
            Some(DataValue::Ints(v)) => Cow::Owned(v.iter().map(|x| *x as f64).collect()),
            _ => Cow::Borrowed(&[]),
        }
    }
}
