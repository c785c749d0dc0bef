//! Parameter domains and the transforms that keep draws inside them.
//!
//! Samplers move in unconstrained space; each coordinate is mapped back into
//! its declared [`Domain`] before the log-density is evaluated, and the
//! log-absolute-Jacobian of that map is added to the target. A draw can
//! therefore never leave its domain: there is nothing to filter afterwards.

use serde::{Deserialize, Serialize};

/// Support of a real-valued parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// The whole real line.
    Real,
    /// `[lower, ∞)`.
    Lower(f64),
    /// `(-∞, upper]`.
    Upper(f64),
    /// `[lower, upper]`.
    Interval(f64, f64),
}

impl Domain {
    pub fn lower(a: f64) -> Self {
        Domain::Lower(a)
    }

    pub fn upper(b: f64) -> Self {
        Domain::Upper(b)
    }

    pub fn interval(a: f64, b: f64) -> Self {
        Domain::Interval(a, b)
    }

    /// `true` if `x` lies inside the domain.
    pub fn contains(&self, x: f64) -> bool {
        match *self {
            Domain::Real => x.is_finite(),
            Domain::Lower(a) => x >= a && x.is_finite(),
            Domain::Upper(b) => x <= b && x.is_finite(),
            Domain::Interval(a, b) => x >= a && x <= b,
        }
    }

    /// Maps an unconstrained value into the domain.
    ///
    /// Returns the constrained value together with `log |dx/du|`.
    pub fn constrain(&self, u: f64) -> (f64, f64) {
        match *self {
            Domain::Real => (u, 0.0),
            Domain::Lower(a) => (a + u.exp(), u),
            Domain::Upper(b) => (b - u.exp(), u),
            Domain::Interval(a, b) => {
                let width = b - a;
                let x = a + width * logistic(u);
                // log σ(u) + log σ(-u), written to stay finite for large |u|.
                let log_jac = width.ln() - softplus(-u) - softplus(u);
                (x, log_jac)
            }
        }
    }

    /// Inverse of [`Domain::constrain`].
    pub fn unconstrain(&self, x: f64) -> f64 {
        match *self {
            Domain::Real => x,
            Domain::Lower(a) => (x - a).ln(),
            Domain::Upper(b) => (b - x).ln(),
            Domain::Interval(a, b) => {
                let p = (x - a) / (b - a);
                (p / (1.0 - p)).ln()
            }
        }
    }

    /// The `(lower, upper)` pair, with infinities for open ends.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Domain::Real => (f64::NEG_INFINITY, f64::INFINITY),
            Domain::Lower(a) => (a, f64::INFINITY),
            Domain::Upper(b) => (f64::NEG_INFINITY, b),
            Domain::Interval(a, b) => (a, b),
        }
    }
}

/// `1 / (1 + e^{-u})`.
pub fn logistic(u: f64) -> f64 {
    if u >= 0.0 {
        1.0 / (1.0 + (-u).exp())
    } else {
        let e = u.exp();
        e / (1.0 + e)
    }
}

/// `log(1 + e^{u})`.
pub fn softplus(u: f64) -> f64 {
    if u > 0.0 {
        u + (-u).exp().ln_1p()
    } else {
        u.exp().ln_1p()
    }
}
