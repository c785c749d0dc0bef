/*!
# Hierarchical two-parameter logistic item response model

Person `j` answers item `i` correctly (`y[i, j] = 1`) with probability
`logistic(alpha[i] * (theta[j] - beta[i]))`. Item discriminations and
difficulties share a bivariate normal population on `(log alpha, beta)`:

```text
theta[j]              ~ normal(0, 1)
(log alpha[i], beta[i]) ~ MVN(mu, diag(tau) Omega diag(tau)),  Omega = [[1, rho], [rho, 1]]
mu[0] ~ normal(0, 1),  mu[1] ~ normal(0, 5)
tau[k] ~ exponential(0.1)
rho    ~ lkj(4)
y[i, j] ~ bernoulli_logit(alpha[i] * (theta[j] - beta[i]))
```

The density on `alpha` includes the `-log alpha` change-of-variables term.
Responses are stored row-major, one row per item.
*/

use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use super::{invalid_setting, Simulated};
use crate::dataset::Dataset;
use crate::distributions::{
    bernoulli_logit_lpmf, bivariate_normal_lpdf, exponential_lpdf, lkj_corr_2_lpdf, normal_lpdf,
};
use crate::error::{Result, SchemaError};
use crate::model::{DataDecl, Domain, LogDensity, ModelSpec, ParamDecl, Params, Shape};
use crate::summary::GeneratingValues;
use crate::transform::logistic;

const TAU_RATE: f64 = 0.1;
const LKJ_ETA: f64 = 4.0;

struct IrtDensity;

/// Borrowed view of one evaluation point.
struct Point<'a> {
    theta: &'a [f64],
    alpha: &'a [f64],
    beta: &'a [f64],
    mu: [f64; 2],
    tau: [f64; 2],
    rho: f64,
    y: &'a [i64],
    persons: usize,
}

impl<'a> Point<'a> {
    fn new(params: &Params<'a>, data: &'a Dataset) -> Option<Self> {
        let (mu, tau) = (params.get("mu"), params.get("tau"));
        let persons = usize::try_from(data.int("J")?).ok()?;
        Some(Self {
            theta: params.get("theta"),
            alpha: params.get("alpha"),
            beta: params.get("beta"),
            mu: [*mu.first()?, *mu.get(1)?],
            tau: [*tau.first()?, *tau.get(1)?],
            rho: params.scalar("rho"),
            y: data.ints("y"),
            persons,
        })
    }

    fn response(&self, item: usize, person: usize) -> f64 {
        let eta = self.alpha[item] * (self.theta[person] - self.beta[item]);
        bernoulli_logit_lpmf(self.y[item * self.persons + person] == 1, eta)
    }

    fn item_prior(&self, item: usize) -> f64 {
        let log_alpha = self.alpha[item].ln();
        bivariate_normal_lpdf([log_alpha, self.beta[item]], self.mu, self.tau, self.rho) - log_alpha
    }

    fn item(&self, item: usize) -> f64 {
        self.item_prior(item)
            + (0..self.persons)
                .map(|j| self.response(item, j))
                .sum::<f64>()
    }

    fn person(&self, person: usize) -> f64 {
        normal_lpdf(self.theta[person], 0.0, 1.0)
            + (0..self.alpha.len())
                .map(|i| self.response(i, person))
                .sum::<f64>()
    }

    fn hyper(&self) -> f64 {
        normal_lpdf(self.mu[0], 0.0, 1.0)
            + normal_lpdf(self.mu[1], 0.0, 5.0)
            + exponential_lpdf(self.tau[0], TAU_RATE)
            + exponential_lpdf(self.tau[1], TAU_RATE)
            + lkj_corr_2_lpdf(self.rho, LKJ_ETA)
            + (0..self.alpha.len()).map(|i| self.item_prior(i)).sum::<f64>()
    }

    fn consistent(&self) -> bool {
        self.alpha.len() == self.beta.len()
            && self.theta.len() == self.persons
            && self.y.len() == self.alpha.len() * self.persons
    }
}

impl LogDensity for IrtDensity {
    fn parameters(&self) -> &[&str] {
        &["mu", "tau", "rho", "alpha", "beta", "theta"]
    }

    fn data_fields(&self) -> &[&str] {
        &["I", "J", "y"]
    }

    fn log_density(&self, params: &Params<'_>, data: &Dataset) -> f64 {
        let Some(p) = Point::new(params, data).filter(Point::consistent) else {
            return f64::NEG_INFINITY;
        };
        let persons: f64 = p.theta.iter().map(|t| normal_lpdf(*t, 0.0, 1.0)).sum();
        let responses: f64 = (0..p.alpha.len())
            .flat_map(|i| (0..p.persons).map(move |j| (i, j)))
            .map(|(i, j)| p.response(i, j))
            .sum();
        p.hyper() + persons + responses
    }

    fn conditional_log_density(
        &self,
        params: &Params<'_>,
        data: &Dataset,
        param: &str,
        index: usize,
    ) -> f64 {
        let Some(p) = Point::new(params, data).filter(Point::consistent) else {
            return f64::NEG_INFINITY;
        };
        match param {
            "theta" if index < p.persons => p.person(index),
            "alpha" | "beta" if index < p.alpha.len() => p.item(index),
            "mu" | "tau" | "rho" => p.hyper(),
            _ => f64::NEG_INFINITY,
        }
    }
}

/// The hierarchical 2PL model.
pub fn spec() -> std::result::Result<ModelSpec, SchemaError> {
    ModelSpec::builder("irt_2pl")
        .data(DataDecl::int("I", Shape::Scalar).with_lower(0.0))
        .data(DataDecl::int("J", Shape::Scalar).with_lower(0.0))
        .data(
            DataDecl::int("y", Shape::matrix("I", "J"))
                .with_lower(0.0)
                .with_upper(1.0),
        )
        .param(ParamDecl::vector("mu", 2, Domain::Real))
        .param(ParamDecl::vector("tau", 2, Domain::lower(0.0)))
        .param(ParamDecl::scalar("rho", Domain::interval(-1.0, 1.0)))
        .param(ParamDecl::vector("alpha", "I", Domain::lower(0.0)))
        .param(ParamDecl::vector("beta", "I", Domain::Real))
        .param(ParamDecl::vector("theta", "J", Domain::Real))
        .density(IrtDensity)
        .build()
}

/// Settings for simulating item responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrtSimulation {
    pub num_items: usize,
    pub num_persons: usize,
    /// Means of `(log alpha, beta)`.
    pub mu: [f64; 2],
    /// Standard deviations of `(log alpha, beta)`.
    pub tau: [f64; 2],
    /// Correlation of `log alpha` and `beta`.
    pub rho: f64,
}

impl Default for IrtSimulation {
    fn default() -> Self {
        Self {
            num_items: 20,
            num_persons: 1000,
            mu: [0.0, 0.0],
            tau: [0.25, 1.0],
            rho: 0.3,
        }
    }
}

/// Draws item parameters, abilities and responses.
pub fn simulate<R: Rng + ?Sized>(settings: &IrtSimulation, rng: &mut R) -> Result<Simulated> {
    let IrtSimulation {
        num_items,
        num_persons,
        mu,
        tau,
        rho,
    } = *settings;
    if !(-1.0..=1.0).contains(&rho) {
        return Err(invalid_setting("IRT", format!("correlation {rho} is outside [-1, 1]")));
    }
    if !(tau[0] > 0.0 && tau[1] > 0.0) {
        return Err(invalid_setting("IRT", "scales must be positive"));
    }
    let log_alpha = Normal::new(mu[0], tau[0]).map_err(|e| invalid_setting("IRT", e))?;
    let residual = Normal::new(0.0, tau[1] * (1.0 - rho * rho).sqrt())
        .map_err(|e| invalid_setting("IRT", e))?;

    let mut alpha = Vec::with_capacity(num_items);
    let mut beta = Vec::with_capacity(num_items);
    for _ in 0..num_items {
        let la: f64 = log_alpha.sample(rng);
        let b = mu[1] + rho * tau[1] / tau[0] * (la - mu[0]) + residual.sample(rng);
        alpha.push(la.exp());
        beta.push(b);
    }
    let theta: Vec<f64> = (0..num_persons).map(|_| StandardNormal.sample(rng)).collect();

    let mut y = Vec::with_capacity(num_items * num_persons);
    for i in 0..num_items {
        for t in &theta {
            let p = logistic(alpha[i] * (t - beta[i]));
            let correct = Bernoulli::new(p)
                .map_err(|e| invalid_setting("IRT", e))?
                .sample(rng);
            y.push(i64::from(correct));
        }
    }

    let data = Dataset::new()
        .with_int("I", num_items as i64)
        .with_int("J", num_persons as i64)
        .with_ints("y", y);
    let generating = GeneratingValues::new()
        .with("mu", mu.to_vec())
        .with("tau", tau.to_vec())
        .with_scalar("rho", rho)
        .with("alpha", alpha)
        .with("beta", beta)
        .with("theta", theta);
    Ok(Simulated { data, generating })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn small() -> Simulated {
        let settings = IrtSimulation {
            num_items: 4,
            num_persons: 30,
            ..Default::default()
        };
        simulate(&settings, &mut SmallRng::seed_from_u64(5)).unwrap()
    }

    fn point_values(sim: &Simulated, spec: &ModelSpec) -> Vec<f64> {
        let layout = spec.layout(&sim.data).unwrap();
        layout
            .entries()
            .iter()
            .flat_map(|e| sim.generating.get(&e.name).unwrap().to_vec())
            .collect()
    }

    #[test]
    fn simulation_respects_schema() {
        let sim = small();
        spec().unwrap().validate(&sim.data).unwrap();
        assert_eq!(sim.data.ints("y").len(), 120);
        assert!(sim.generating.get("alpha").unwrap().iter().all(|a| *a > 0.0));
    }

    #[test]
    fn rejects_non_binary_responses() {
        let sim = small();
        let mut y = sim.data.ints("y").to_vec();
        y[7] = 2;
        let bad = sim.data.clone().with_ints("y", y);
        assert!(spec().unwrap().validate(&bad).is_err());
    }

    #[test]
    fn conditionals_differ_from_joint_by_a_constant() {
        let sim = small();
        let spec = spec().unwrap();
        let layout = spec.layout(&sim.data).unwrap();
        let values = point_values(&sim, &spec);

        for name in ["alpha", "beta", "theta", "tau", "rho"] {
            let entry = layout.entry(name).unwrap();
            let mut moved = values.clone();
            moved[entry.offset + entry.len() - 1] *= 1.1;
            let joint = spec.log_density(&layout, &moved, &sim.data)
                - spec.log_density(&layout, &values, &sim.data);
            let cond = |v: &[f64]| {
                spec.density().conditional_log_density(
                    &Params::new(&layout, v),
                    &sim.data,
                    name,
                    entry.len() - 1,
                )
            };
            assert_abs_diff_eq!(cond(&moved) - cond(&values), joint, epsilon = 1e-8);
        }
    }

    #[test]
    fn alpha_prior_is_lognormal() {
        // With one item and no persons the item prior on alpha is the
        // log-normal density when beta's population is independent.
        let data = Dataset::new()
            .with_int("I", 1)
            .with_int("J", 0)
            .with_ints("y", vec![]);
        let spec = spec().unwrap();
        let layout = spec.layout(&data).unwrap();
        // mu, tau, rho, alpha, beta
        let values = [0.0, 0.0, 0.5, 1.0, 0.0, 1.3, 0.2];
        let lp = spec
            .density()
            .conditional_log_density(&Params::new(&layout, &values), &data, "alpha", 0);
        let expected = normal_lpdf(1.3_f64.ln(), 0.0, 0.5) - 1.3_f64.ln() + normal_lpdf(0.2, 0.0, 1.0);
        assert_abs_diff_eq!(lp, expected, epsilon = 1e-12);
    }
}
