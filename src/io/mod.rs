//! Persistence of run output.

#[cfg(feature = "csv")]
pub mod csv;
