//! Posterior summaries and recovery checks against generating values.
//!
//! [`summarize`] pools the post-warm-up draws of every chain and reports, for
//! each scalar component, the posterior mean, standard deviation, median and
//! a central credible interval. When the data were simulated, passing the
//! [`GeneratingValues`] adds the discrepancy between posterior mean and
//! generating value, and whether the interval covers the generating value.

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::RunResult;
use crate::error::{Error, KeyMismatchError};

/// Default credible-interval mass.
pub const DEFAULT_INTERVAL: f64 = 0.95;

/// Values used to simulate a dataset, keyed by parameter (or generated
/// quantity) name; vector quantities are flat, as in a draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratingValues(BTreeMap<String, Vec<f64>>);

impl GeneratingValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, vec![value])
    }

    pub fn with(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// How a posterior summary compares to the value that generated the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recovery {
    pub generating: f64,
    /// Posterior mean minus generating value.
    pub discrepancy: f64,
    /// The credible interval contains the generating value.
    pub covers: bool,
}

/// Summary of one scalar component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSummary {
    pub name: String,
    /// Parameter or generated quantity this component belongs to.
    pub quantity: String,
    pub mean: f64,
    pub sd: f64,
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
    pub recovery: Option<Recovery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Credible-interval mass, e.g. 0.95.
    pub interval: f64,
    pub num_draws: usize,
    pub params: Vec<ParamSummary>,
}

impl ComparisonReport {
    pub fn get(&self, name: &str) -> Option<&ParamSummary> {
        self.params.iter().find(|p| p.name == name)
    }

    /// All components of parameter (or generated quantity) `quantity`.
    pub fn components<'a>(&'a self, quantity: &'a str) -> impl Iterator<Item = &'a ParamSummary> {
        self.params.iter().filter(move |p| p.quantity == quantity)
    }

    /// `(covering, compared)` component counts of `quantity`.
    pub fn coverage(&self, quantity: &str) -> (usize, usize) {
        self.components(quantity)
            .filter_map(|p| p.recovery)
            .fold((0, 0), |(covered, total), r| {
                (covered + r.covers as usize, total + 1)
            })
    }

    pub fn to_table(&self) -> String {
        let width = self
            .params
            .iter()
            .map(|p| p.name.len())
            .max()
            .unwrap_or(0)
            .max(9);
        let lo = format!("{:.1}%", 50.0 * (1.0 - self.interval));
        let hi = format!("{:.1}%", 50.0 * (1.0 + self.interval));
        let compare = self.params.iter().any(|p| p.recovery.is_some());

        let mut header = format!(
            "{:<width$} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "Parameter", "mean", "sd", "median", lo, hi
        );
        if compare {
            header.push_str(&format!(" {:>10} {:>10} {:>6}", "generating", "discrep.", "covers"));
        }
        let rule = "─".repeat(header.chars().count());

        let mut lines = vec![
            format!("{} pooled post-warm-up draws", self.num_draws),
            String::new(),
            header,
            rule.clone(),
        ];
        for p in &self.params {
            let mut line = format!(
                "{:<width$} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                p.name, p.mean, p.sd, p.median, p.lower, p.upper
            );
            if let Some(r) = p.recovery {
                line.push_str(&format!(
                    " {:>10.4} {:>10.4} {:>6}",
                    r.generating,
                    r.discrepancy,
                    if r.covers { "yes" } else { "NO" }
                ));
            }
            lines.push(line);
        }
        lines.push(rule);
        lines.join("\n")
    }
}

/// Summarises `run` with 95% central credible intervals.
pub fn summarize(
    run: &RunResult,
    generating: Option<&GeneratingValues>,
) -> Result<ComparisonReport, KeyMismatchError> {
    summarize_checked(run, generating, DEFAULT_INTERVAL)
}

/// Summarises `run` with central credible intervals of mass `interval`,
/// which must lie strictly between 0 and 1.
pub fn summarize_with(
    run: &RunResult,
    generating: Option<&GeneratingValues>,
    interval: f64,
) -> crate::error::Result<ComparisonReport> {
    check_interval(interval)?;
    Ok(summarize_checked(run, generating, interval)?)
}

/// Rejects credible-interval masses outside `(0, 1)`, NaN included.
pub fn check_interval(interval: f64) -> crate::error::Result<()> {
    if interval > 0.0 && interval < 1.0 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "interval must lie strictly between 0 and 1, found {interval}"
        )))
    }
}

fn summarize_checked(
    run: &RunResult,
    generating: Option<&GeneratingValues>,
    interval: f64,
) -> Result<ComparisonReport, KeyMismatchError> {
    let layout = run.layout();
    // (quantity name, flat offset in the component list, length)
    let mut quantities = Vec::new();
    let mut offset = 0;
    for e in layout.entries().iter().chain(layout.generated_entries()) {
        quantities.push((e.name.as_str(), offset, e.len()));
        offset += e.len();
    }

    if let Some(generating) = generating {
        for name in generating.names() {
            if !quantities.iter().any(|(q, _, _)| *q == name) {
                return Err(KeyMismatchError::Unknown(name.to_string()));
            }
        }
        for entry in layout.entries() {
            if generating.get(&entry.name).is_none() {
                return Err(KeyMismatchError::Missing(entry.name.clone()));
            }
        }
        for &(name, _, len) in &quantities {
            if let Some(values) = generating.get(name) {
                if values.len() != len {
                    return Err(KeyMismatchError::Shape {
                        name: name.to_string(),
                        expected: len,
                        found: values.len(),
                    });
                }
            }
        }
    }

    // Chain blocks stacked row-wise; every block has `names.len()` columns.
    let (names, matrices) = run.component_draws(true);
    let rows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let mut pooled = Array2::<f64>::zeros((rows, names.len()));
    let mut row = 0;
    for m in &matrices {
        pooled.slice_mut(s![row..row + m.nrows(), ..]).assign(m);
        row += m.nrows();
    }

    let p_lo = (1.0 - interval) / 2.0;
    let p_hi = (1.0 + interval) / 2.0;

    let mut params = Vec::with_capacity(names.len());
    for &(quantity, offset, len) in &quantities {
        let truth = generating.and_then(|g| g.get(quantity));
        for i in 0..len {
            let column = pooled.column(offset + i);
            let mut sorted = column.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));

            let mean = column.mean().unwrap_or(f64::NAN);
            let lower = quantile_sorted(&sorted, p_lo);
            let upper = quantile_sorted(&sorted, p_hi);
            let recovery = truth.map(|t| {
                let generating = t[i];
                Recovery {
                    generating,
                    discrepancy: mean - generating,
                    covers: lower - generating <= 0.0 && 0.0 <= upper - generating,
                }
            });
            params.push(ParamSummary {
                name: names[offset + i].clone(),
                quantity: quantity.to_string(),
                mean,
                sd: if column.len() > 1 { column.std(1.0) } else { f64::NAN },
                median: quantile_sorted(&sorted, 0.5),
                lower,
                upper,
                recovery,
            });
        }
    }

    Ok(ComparisonReport {
        interval,
        num_draws: pooled.nrows(),
        params,
    })
}

/// Quantile `q` of ascending `sorted` by linear interpolation between order
/// statistics at `h = (n − 1) q`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quantiles_interpolate_between_order_statistics() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.1), 1.4, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.975), 4.9, epsilon = 1e-12);
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn interval_mass_must_be_a_probability() {
        assert!(check_interval(0.5).is_ok());
        assert!(check_interval(DEFAULT_INTERVAL).is_ok());
        for bad in [0.0, 1.0, 1.5, -0.2, f64::NAN] {
            let err = check_interval(bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn generating_values_round_trip_through_json() {
        let truth = GeneratingValues::new()
            .with_scalar("phi", 0.27)
            .with("theta", vec![0.2, 0.3]);
        let json = serde_json::to_string(&truth).unwrap();
        assert_eq!(json, r#"{"phi":[0.27],"theta":[0.2,0.3]}"#);
        let back: GeneratingValues = serde_json::from_str(&json).unwrap();
        assert_eq!(back, truth);
    }

    #[test]
    fn coverage_counts_only_compared_components() {
        let summary = |name: &str, covers: Option<bool>| ParamSummary {
            name: name.to_string(),
            quantity: "theta".to_string(),
            mean: 0.0,
            sd: 1.0,
            median: 0.0,
            lower: -2.0,
            upper: 2.0,
            recovery: covers.map(|covers| Recovery {
                generating: 0.0,
                discrepancy: 0.0,
                covers,
            }),
        };
        let report = ComparisonReport {
            interval: 0.9,
            num_draws: 10,
            params: vec![
                summary("theta[0]", Some(true)),
                summary("theta[1]", Some(false)),
                summary("theta[2]", Some(true)),
            ],
        };
        assert_eq!(report.coverage("theta"), (2, 3));
        assert_eq!(report.coverage("phi"), (0, 0));
        let table = report.to_table();
        assert!(table.contains("5.0%") && table.contains("95.0%"), "{table}");
        assert!(table.contains("NO"));
    }
}
