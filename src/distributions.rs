/*!
Log-densities used by the case-study models, and the [`Target`] trait through
which samplers see a model.

All functions return natural-log densities (or masses) and return
`f64::NEG_INFINITY` outside the support instead of panicking, so a sampler
can reject such points like any other low-density proposal.

# Examples

```rust
use posterior_pipeline::distributions::{beta_lpdf, binomial_lpmf};

let lp = beta_lpdf(0.27, 13.5, 36.5) + binomial_lpmf(12, 45, 0.27);
assert!(lp.is_finite());
assert_eq!(beta_lpdf(1.5, 2.0, 2.0), f64::NEG_INFINITY);
```
*/

use statrs::function::factorial::ln_binomial;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

use crate::transform::{softplus, Domain};

/// A continuous target distribution as seen by a sampler.
///
/// Samplers move each coordinate in unconstrained space and map it back with
/// [`Target::constrain`]; densities are always evaluated on constrained
/// values.
pub trait Target: Sync {
    /// Number of scalar coordinates.
    fn dim(&self) -> usize;

    /// Domain of coordinate `coord`.
    fn domain(&self, coord: usize) -> Domain;

    /// Constrained value of coordinate `coord` and `log |dx/du|`.
    fn constrain(&self, coord: usize, u: f64) -> (f64, f64) {
        self.domain(coord).constrain(u)
    }

    /// Unnormalised log-density at constrained `theta`.
    fn unnorm_log_prob(&self, theta: &[f64]) -> f64;

    /// Terms of the log-density that involve coordinate `coord`.
    fn conditional_log_prob(&self, theta: &[f64], coord: usize) -> f64 {
        let _ = coord;
        self.unnorm_log_prob(theta)
    }

    /// Name of coordinate `coord`, used in error messages.
    fn coord_name(&self, coord: usize) -> String {
        format!("x[{coord}]")
    }
}

/// Normal(mu, sigma).
pub fn normal_lpdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 || !sigma.is_finite() {
        return f64::NEG_INFINITY;
    }
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - 0.5 * (2.0 * PI).ln()
}

/// Exponential(rate).
pub fn exponential_lpdf(x: f64, rate: f64) -> f64 {
    if x < 0.0 || rate <= 0.0 {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * x
}

/// Pareto(y_min, alpha).
pub fn pareto_lpdf(x: f64, y_min: f64, alpha: f64) -> f64 {
    if x < y_min || y_min <= 0.0 || alpha <= 0.0 {
        return f64::NEG_INFINITY;
    }
    alpha.ln() + alpha * y_min.ln() - (alpha + 1.0) * x.ln()
}

/// `ln B(a, b)`.
pub fn ln_beta_fn(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Beta(a, b).
pub fn beta_lpdf(x: f64, a: f64, b: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) || a <= 0.0 || b <= 0.0 {
        return f64::NEG_INFINITY;
    }
    (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln() - ln_beta_fn(a, b)
}

/// Binomial(n, p) mass at `k`.
pub fn binomial_lpmf(k: u64, n: u64, p: f64) -> f64 {
    if k > n || !(0.0..=1.0).contains(&p) {
        return f64::NEG_INFINITY;
    }
    let (k_f, n_f) = (k as f64, n as f64);
    let mut lp = ln_binomial(n, k);
    // 0 * ln(0) is taken as 0 so that p = 0 or 1 is handled exactly.
    if k > 0 {
        lp += k_f * p.ln();
    }
    if k < n {
        lp += (n_f - k_f) * (1.0 - p).ln();
    }
    lp
}

/// Bernoulli mass of `y` with success log-odds `eta`.
pub fn bernoulli_logit_lpmf(y: bool, eta: f64) -> f64 {
    if y {
        -softplus(-eta)
    } else {
        -softplus(eta)
    }
}

/// LKJ(eta) density of the correlation `rho` of a 2 × 2 correlation matrix.
pub fn lkj_corr_2_lpdf(rho: f64, eta: f64) -> f64 {
    if !(-1.0..=1.0).contains(&rho) || eta <= 0.0 {
        return f64::NEG_INFINITY;
    }
    (eta - 1.0) * (1.0 - rho * rho).ln()
}

/// Bivariate normal with means `mu`, scales `tau` and correlation `rho`.
pub fn bivariate_normal_lpdf(x: [f64; 2], mu: [f64; 2], tau: [f64; 2], rho: f64) -> f64 {
    if tau[0] <= 0.0 || tau[1] <= 0.0 || rho.abs() >= 1.0 {
        return f64::NEG_INFINITY;
    }
    let z0 = (x[0] - mu[0]) / tau[0];
    let z1 = (x[1] - mu[1]) / tau[1];
    let one_minus_rho2 = 1.0 - rho * rho;
    let quad = (z0 * z0 - 2.0 * rho * z0 * z1 + z1 * z1) / one_minus_rho2;
    -(2.0 * PI).ln() - tau[0].ln() - tau[1].ln() - 0.5 * one_minus_rho2.ln() - 0.5 * quad
}

#[cfg(test)]
mod distributions_tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normal_matches_reference() {
        // dnorm(1.3, 0.5, 2, log = TRUE)
        assert_abs_diff_eq!(normal_lpdf(1.3, 0.5, 2.0), -1.6920857138, epsilon = 1e-9);
        assert_eq!(normal_lpdf(0.0, 0.0, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn beta_matches_reference() {
        // dbeta(0.3, 2, 5, log = TRUE)
        assert_abs_diff_eq!(beta_lpdf(0.3, 2.0, 5.0), 0.7705248, epsilon = 1e-6);
    }

    #[test]
    fn binomial_matches_reference_and_edges() {
        // dbinom(12, 45, 0.27, log = TRUE)
        assert_abs_diff_eq!(binomial_lpmf(12, 45, 0.27), -2.0152023, epsilon = 1e-5);
        assert_abs_diff_eq!(binomial_lpmf(0, 10, 0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(binomial_lpmf(10, 10, 1.0), 0.0, epsilon = 1e-12);
        assert_eq!(binomial_lpmf(11, 10, 0.5), f64::NEG_INFINITY);
    }

    #[test]
    fn pareto_and_exponential() {
        // Pareto(1, 1.5) at 2: log(1.5) - 2.5 log(2)
        assert_abs_diff_eq!(
            pareto_lpdf(2.0, 1.0, 1.5),
            1.5_f64.ln() - 2.5 * 2.0_f64.ln(),
            epsilon = 1e-12
        );
        assert_eq!(pareto_lpdf(0.5, 1.0, 1.5), f64::NEG_INFINITY);
        assert_abs_diff_eq!(exponential_lpdf(3.0, 0.1), 0.1_f64.ln() - 0.3, epsilon = 1e-12);
    }

    #[test]
    fn bernoulli_logit_is_normalised() {
        for eta in [-30.0, -1.2, 0.0, 0.7, 30.0] {
            let total = bernoulli_logit_lpmf(true, eta).exp() + bernoulli_logit_lpmf(false, eta).exp();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn bivariate_normal_factorises_without_correlation() {
        let joint = bivariate_normal_lpdf([0.3, -1.0], [0.0, 0.5], [0.25, 1.0], 0.0);
        let product = normal_lpdf(0.3, 0.0, 0.25) + normal_lpdf(-1.0, 0.5, 1.0);
        assert_abs_diff_eq!(joint, product, epsilon = 1e-12);
        assert_eq!(lkj_corr_2_lpdf(0.0, 4.0), 0.0);
    }
}
