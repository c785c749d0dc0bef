//! Convergence diagnostics: split R-hat and multi-chain effective sample size.
//!
//! Both statistics are computed per scalar component (parameters and
//! generated quantities alike) from the chains of a [`RunResult`]. They are
//! pure functions of the run, so diagnosing the same run twice gives the
//! same report.

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::core::RunResult;
use crate::error::InsufficientDataError;

/// Split R-hat above this value marks a component as not converged.
pub const RHAT_THRESHOLD: f64 = 1.1;

/// A diagnostic value, or the reason there is none.
///
/// Serialises as a number when finite and otherwise as its display string
/// (`"inf"`, `"-inf"`, `"nan"`, `"n/a"`), since JSON has no non-finite
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Value(f64),
    /// Undefined for this quantity, e.g. R-hat of a constant.
    NotApplicable,
}

impl Statistic {
    pub fn value(&self) -> Option<f64> {
        match *self {
            Statistic::Value(v) => Some(v),
            Statistic::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Statistic::Value(_))
    }
}

impl Serialize for Statistic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Statistic::Value(v) if v.is_finite() => serializer.serialize_f64(v),
            Statistic::Value(v) if v.is_nan() => serializer.serialize_str("nan"),
            Statistic::Value(v) if v > 0.0 => serializer.serialize_str("inf"),
            Statistic::Value(_) => serializer.serialize_str("-inf"),
            Statistic::NotApplicable => serializer.serialize_str("n/a"),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(3);
        match *self {
            Statistic::Value(v) if v.is_infinite() => f.pad(if v > 0.0 { "inf" } else { "-inf" }),
            Statistic::Value(v) => f.pad(&format!("{v:.precision$}")),
            Statistic::NotApplicable => f.pad("n/a"),
        }
    }
}

/// Diagnostics of one scalar component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDiagnostics {
    pub name: String,
    pub rhat: Statistic,
    pub ess: Statistic,
}

impl ParamDiagnostics {
    /// `false` only when R-hat exceeds [`RHAT_THRESHOLD`].
    pub fn converged(&self) -> bool {
        self.rhat.value().map_or(true, |r| r <= RHAT_THRESHOLD)
    }
}

/// Diagnostics of every scalar component of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub num_chains: usize,
    pub draws_per_chain: usize,
    pub discard_warmup: bool,
    pub params: Vec<ParamDiagnostics>,
}

impl DiagnosticReport {
    pub fn get(&self, name: &str) -> Option<&ParamDiagnostics> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Components whose R-hat exceeds [`RHAT_THRESHOLD`].
    pub fn non_converged(&self) -> Vec<&ParamDiagnostics> {
        self.params.iter().filter(|p| !p.converged()).collect()
    }

    /// Largest applicable R-hat.
    pub fn max_rhat(&self) -> Option<f64> {
        let values: Array1<f64> = self.params.iter().filter_map(|p| p.rhat.value()).collect();
        values.max().ok().copied()
    }

    /// Smallest applicable effective sample size.
    pub fn min_ess(&self) -> Option<f64> {
        let values: Array1<f64> = self.params.iter().filter_map(|p| p.ess.value()).collect();
        values.min().ok().copied()
    }

    pub fn to_table(&self) -> String {
        let width = self
            .params
            .iter()
            .map(|p| p.name.len())
            .max()
            .unwrap_or(0)
            .max(9);
        let mut lines = Vec::with_capacity(self.params.len() + 6);
        lines.push(format!(
            "{} chains × {} draws per chain{}",
            self.num_chains,
            self.draws_per_chain,
            if self.discard_warmup {
                ""
            } else {
                " (warm-up included)"
            }
        ));
        lines.push(String::new());
        lines.push(format!("{:<width$} {:>8} {:>10}", "Parameter", "r_hat", "ess"));
        lines.push("─".repeat(width + 20));
        for p in &self.params {
            let ess = match p.ess {
                Statistic::Value(v) => format!("{v:.0}"),
                Statistic::NotApplicable => "n/a".to_string(),
            };
            let flag = if p.converged() { "" } else { "  !" };
            lines.push(format!("{:<width$} {:>8} {:>10}{flag}", p.name, p.rhat, ess));
        }
        lines.push("─".repeat(width + 20));
        let bad = self.non_converged();
        if bad.is_empty() {
            lines.push(format!("All R-hat values ≤ {RHAT_THRESHOLD}."));
        } else {
            lines.push(format!(
                "{} component(s) with R-hat > {RHAT_THRESHOLD}: chains may not have converged.",
                bad.len()
            ));
        }
        lines.join("\n")
    }
}

/// Computes split R-hat and ESS for every component of `run`.
///
/// With `discard_warmup` only post-warm-up draws are used. Fails when there
/// are fewer than 2 chains or fewer than 2 retained draws per chain.
pub fn diagnose(
    run: &RunResult,
    discard_warmup: bool,
) -> Result<DiagnosticReport, InsufficientDataError> {
    if run.num_chains() < 2 {
        return Err(InsufficientDataError::TooFewChains(run.num_chains()));
    }
    for chain in run.chains() {
        let found = chain.samples(discard_warmup).nrows();
        if found < 2 {
            return Err(InsufficientDataError::TooFewDraws {
                chain: chain.index(),
                found,
            });
        }
    }

    let (names, matrices) = run.component_draws(discard_warmup);
    let draws_per_chain = matrices.first().map_or(0, |m| m.nrows());
    let mut planner = FftPlanner::new();

    let params: Vec<ParamDiagnostics> = names
        .into_iter()
        .enumerate()
        .map(|(k, name)| {
            let traces: Vec<ArrayView1<f64>> = matrices.iter().map(|m| m.column(k)).collect();
            ParamDiagnostics {
                name,
                rhat: split_rhat(&traces),
                ess: ess_with(&mut planner, &traces),
            }
        })
        .collect();

    let report = DiagnosticReport {
        num_chains: run.num_chains(),
        draws_per_chain,
        discard_warmup,
        params,
    };
    for p in report.non_converged() {
        log::warn!("`{}` has not converged: R-hat = {}", p.name, p.rhat);
    }
    Ok(report)
}

/// Split R-hat of one scalar quantity.
///
/// Each trace is cut into two halves of `⌊len / 2⌋` draws; for odd lengths
/// the first draw is dropped. Traces are expected to share one length.
pub fn split_rhat(traces: &[ArrayView1<f64>]) -> Statistic {
    let len = traces.iter().map(|t| t.len()).min().unwrap_or(0);
    let start = len % 2;
    let n = (len - start) / 2;
    if traces.is_empty() || n < 2 {
        return Statistic::NotApplicable;
    }

    let halves: Vec<ArrayView1<f64>> = traces
        .iter()
        .flat_map(|t| [t.slice(s![start..start + n]), t.slice(s![start + n..start + 2 * n])])
        .collect();
    let m = halves.len() as f64;
    let n_f = n as f64;

    let means: Array1<f64> = halves.iter().map(|h| h.mean().unwrap_or(f64::NAN)).collect();
    let variances: Array1<f64> = halves.iter().map(|h| h.var(1.0)).collect();
    let grand_mean = means.mean().unwrap_or(f64::NAN);

    let between = n_f / (m - 1.0) * means.mapv(|x| (x - grand_mean).powi(2)).sum();
    let within = variances.mean().unwrap_or(f64::NAN);

    if within == 0.0 {
        return if between == 0.0 {
            Statistic::NotApplicable
        } else {
            Statistic::Value(f64::INFINITY)
        };
    }
    Statistic::Value(((n_f - 1.0) / n_f + between / within / n_f).sqrt())
}

/// Multi-chain effective sample size of one scalar quantity.
pub fn ess(traces: &[ArrayView1<f64>]) -> Statistic {
    ess_with(&mut FftPlanner::new(), traces)
}

fn ess_with(planner: &mut FftPlanner<f64>, traces: &[ArrayView1<f64>]) -> Statistic {
    let n = traces.iter().map(|t| t.len()).min().unwrap_or(0);
    let m = traces.len();
    if m == 0 || n < 2 {
        return Statistic::NotApplicable;
    }
    let traces: Vec<ArrayView1<f64>> = traces.iter().map(|t| t.slice(s![..n])).collect();
    let (m_f, n_f) = (m as f64, n as f64);

    let acov: Vec<Vec<f64>> = traces.iter().map(|t| autocovariance(planner, t)).collect();
    let acov_mean = |lag: usize| acov.iter().map(|a| a[lag]).sum::<f64>() / m_f;

    let means: Array1<f64> = traces.iter().map(|t| t.mean().unwrap_or(f64::NAN)).collect();
    let within = traces.iter().map(|t| t.var(1.0)).sum::<f64>() / m_f;
    let mut var_plus = within * (n_f - 1.0) / n_f;
    if m > 1 {
        var_plus += means.var(1.0);
    }
    if within.is_nan() || within <= 0.0 || var_plus <= 0.0 {
        return Statistic::NotApplicable;
    }

    // Geyer's initial positive sequence over pairs of lags.
    let rho = |lag: usize| 1.0 - (within - acov_mean(lag)) / var_plus;
    let mut rho_hat = vec![0.0; n + 2];
    rho_hat[0] = 1.0;
    let mut even = 1.0;
    let mut odd = rho(1);
    rho_hat[1] = odd;
    let mut t = 1;
    while t + 5 < n && even + odd > 0.0 {
        even = rho(t + 1);
        odd = rho(t + 2);
        if even + odd >= 0.0 {
            rho_hat[t + 1] = even;
            rho_hat[t + 2] = odd;
        }
        t += 2;
    }
    let max_t = t;
    if odd > 0.0 {
        rho_hat[max_t + 1] = odd;
    }

    // Initial monotone sequence.
    let mut t = 1;
    while t + 4 <= max_t {
        let previous = rho_hat[t - 1] + rho_hat[t];
        if rho_hat[t + 1] + rho_hat[t + 2] > previous {
            rho_hat[t + 1] = previous / 2.0;
            rho_hat[t + 2] = rho_hat[t + 1];
        }
        t += 2;
    }

    let total = m_f * n_f;
    let tau = -1.0 + 2.0 * rho_hat[..=max_t].iter().sum::<f64>() + rho_hat[max_t + 1];
    let tau = tau.max(1.0 / total.log10());
    Statistic::Value(total / tau)
}

/// Biased autocovariance `γ_t = 1/n Σ (x_i − x̄)(x_{i+t} − x̄)` for every lag.
fn autocovariance(planner: &mut FftPlanner<f64>, x: &ArrayView1<f64>) -> Vec<f64> {
    let n = x.len();
    let size = 2 * n;
    let mean = x.mean().unwrap_or(0.0);

    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|v| Complex::new(v - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(size - n))
        .collect();
    planner.plan_fft_forward(size).process(&mut buf);
    for c in buf.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(size).process(&mut buf);

    let scale = size as f64 * n as f64;
    buf.iter().take(n).map(|c| c.re / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    fn views(traces: &[Array1<f64>]) -> Vec<ArrayView1<f64>> {
        traces.iter().map(|t| t.view()).collect()
    }

    fn white_noise(seed: u64, n: usize) -> Array1<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..n).map(|_| rng.sample(StandardNormal)).collect()
    }

    fn ar1(seed: u64, n: usize, phi: f64) -> Array1<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x = phi * x + rng.sample::<f64, _>(StandardNormal);
                x
            })
            .collect()
    }

    #[test]
    fn rhat_matches_hand_computation() {
        // Chains [1, 2, 3, 4] and [2, 3, 4, 5] split into four halves of two
        // draws: means 1.5, 3.5, 2.5, 4.5; variances all 0.5.
        // B = 2/3 * 5 = 10/3, W = 0.5, R = sqrt(1/2 + (10/3)/0.5/2).
        let traces = [array![1.0, 2.0, 3.0, 4.0], array![2.0, 3.0, 4.0, 5.0]];
        let expected = (0.5_f64 + 10.0 / 3.0).sqrt();
        let rhat = split_rhat(&views(&traces)).value().unwrap();
        assert_abs_diff_eq!(rhat, expected, epsilon = 1e-12);
    }

    #[test]
    fn odd_lengths_drop_the_first_draw() {
        let odd = [array![100.0, 1.0, 2.0, 3.0, 4.0], array![-7.0, 2.0, 3.0, 4.0, 5.0]];
        let even = [array![1.0, 2.0, 3.0, 4.0], array![2.0, 3.0, 4.0, 5.0]];
        assert_eq!(split_rhat(&views(&odd)), split_rhat(&views(&even)));
    }

    #[test]
    fn constant_quantities_are_not_applicable() {
        let constant = [Array1::from_elem(100, 0.3), Array1::from_elem(100, 0.3)];
        assert_eq!(split_rhat(&views(&constant)), Statistic::NotApplicable);
        assert_eq!(ess(&views(&constant)), Statistic::NotApplicable);

        let stuck = [Array1::from_elem(100, 0.3), Array1::from_elem(100, 0.7)];
        assert_eq!(
            split_rhat(&views(&stuck)),
            Statistic::Value(f64::INFINITY)
        );

        let short = [array![1.0, 2.0, 3.0], array![1.0, 2.0, 3.0]];
        assert_eq!(split_rhat(&views(&short)), Statistic::NotApplicable);
    }

    #[test]
    fn well_mixed_chains_converge() {
        let traces: Vec<Array1<f64>> = (0..4).map(|s| white_noise(s, 1_000)).collect();
        let rhat = split_rhat(&views(&traces)).value().unwrap();
        assert!(rhat < 1.01, "rhat = {rhat}");

        let shifted = [white_noise(0, 1_000), white_noise(1, 1_000) + 3.0];
        let rhat = split_rhat(&views(&shifted)).value().unwrap();
        assert!(rhat > 1.5, "rhat = {rhat}");
    }

    #[test]
    fn ess_of_independent_draws_is_close_to_total() {
        let traces: Vec<Array1<f64>> = (0..4).map(|s| white_noise(10 + s, 1_000)).collect();
        let ess = ess(&views(&traces)).value().unwrap();
        assert!(ess > 3_000.0 && ess < 5_000.0, "ess = {ess}");
    }

    #[test]
    fn ess_reflects_autocorrelation() {
        // AR(1) with phi = 0.9 has integrated autocorrelation time 19.
        let traces: Vec<Array1<f64>> = (0..4).map(|s| ar1(20 + s, 5_000, 0.9)).collect();
        let ess = ess(&views(&traces)).value().unwrap();
        let expected = 20_000.0 / 19.0;
        assert!(
            ess > 0.6 * expected && ess < 1.5 * expected,
            "ess = {ess}, expected about {expected}"
        );
    }

    #[test]
    fn autocovariance_matches_direct_sum() {
        let x = array![0.5, -1.0, 2.0, 0.25, 1.5, -0.75];
        let fft = Array1::from(autocovariance(&mut FftPlanner::new(), &x.view()));
        let mean = x.mean().unwrap();
        let direct: Array1<f64> = (0..x.len())
            .map(|lag| {
                (0..x.len() - lag)
                    .map(|i| (x[i] - mean) * (x[i + lag] - mean))
                    .sum::<f64>()
                    / x.len() as f64
            })
            .collect();
        assert_abs_diff_eq!(fft, direct, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_statistics_stay_distinct_in_json() {
        let report = DiagnosticReport {
            num_chains: 2,
            draws_per_chain: 100,
            discard_warmup: true,
            params: vec![
                ParamDiagnostics {
                    name: "stuck".into(),
                    rhat: Statistic::Value(f64::INFINITY),
                    ess: Statistic::Value(2.5),
                },
                ParamDiagnostics {
                    name: "constant".into(),
                    rhat: Statistic::NotApplicable,
                    ess: Statistic::NotApplicable,
                },
            ],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["params"][0]["rhat"], "inf");
        assert_eq!(json["params"][0]["ess"], 2.5);
        assert_eq!(json["params"][1]["rhat"], "n/a");
        assert_eq!(
            serde_json::to_string(&Statistic::Value(f64::NEG_INFINITY)).unwrap(),
            r#""-inf""#
        );
        assert_eq!(
            serde_json::to_string(&Statistic::Value(f64::NAN)).unwrap(),
            r#""nan""#
        );
    }

    #[test]
    fn statistic_display() {
        assert_eq!(format!("{:>6}", Statistic::NotApplicable), "   n/a");
        assert_eq!(format!("{}", Statistic::Value(1.23456)), "1.235");
        assert_eq!(format!("{}", Statistic::Value(f64::INFINITY)), "inf");
    }
}
