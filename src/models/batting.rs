/*!
# Batting ability

Hierarchical beta-binomial model of batting ability. Player `n` gets `y[n]`
hits in `K[n]` at-bats; abilities are partially pooled towards a population
mean `phi` with concentration `kappa`:

```text
phi      ~ uniform(0, 1)
kappa    ~ pareto(1, 1.5)
theta[n] ~ beta(phi * kappa, (1 - phi) * kappa)
y[n]     ~ binomial(K[n], theta[n])
```

Generated quantities:

- `some_ability_gt_350`: 1 if any player's ability exceeds 0.350.
- `rank[n]`: rank of player `n` by ability, 1 being the best.
- `is_best[n]`: 1 if player `n` has the highest ability.

## Example

```rust
use posterior_pipeline::models::batting;

let spec = batting::spec().unwrap();
let data = batting::efron_morris();
assert!(spec.validate(&data).is_ok());
assert_eq!(data.ints("y")[0], 18);
```
*/

use rand::Rng;
use rand_distr::{Beta, Binomial, Distribution};
use serde::{Deserialize, Serialize};

use super::{invalid_setting, Simulated};
use crate::dataset::Dataset;
use crate::distributions::{binomial_lpmf, ln_beta_fn, pareto_lpdf};
use crate::error::{Result, SchemaError};
use crate::model::{
    DataConstraint, DataDecl, Domain, GeneratedQuantity, LogDensity, ModelSpec, ParamDecl, Params,
    Shape,
};
use crate::summary::GeneratingValues;

/// Efron and Morris (1975): hits in the first 45 at-bats of the 1970 season.
pub const EFRON_MORRIS: [(&str, i64); 18] = [
    ("Roberto Clemente", 18),
    ("Frank Robinson", 17),
    ("Frank Howard", 16),
    ("Jay Johnstone", 15),
    ("Ken Berry", 14),
    ("Jim Spencer", 14),
    ("Don Kessinger", 13),
    ("Luis Alvarado", 12),
    ("Ron Santo", 11),
    ("Ron Swoboda", 11),
    ("Del Unser", 10),
    ("Billy Williams", 10),
    ("George Scott", 10),
    ("Rico Petrocelli", 10),
    ("Ellie Rodriguez", 10),
    ("Bert Campaneris", 9),
    ("Thurman Munson", 8),
    ("Max Alvis", 7),
];

/// At-bats per player in [`EFRON_MORRIS`].
pub const EFRON_MORRIS_AT_BATS: i64 = 45;

const ABILITY_THRESHOLD: f64 = 0.35;

struct BattingDensity;

impl BattingDensity {
    /// `Σ log beta(theta[n] | phi kappa, (1 - phi) kappa)` plus the priors
    /// on `phi` and `kappa`.
    fn population(phi: f64, kappa: f64, theta: &[f64]) -> f64 {
        if !(0.0..=1.0).contains(&phi) {
            return f64::NEG_INFINITY;
        }
        let (a, b) = (phi * kappa, (1.0 - phi) * kappa);
        if a <= 0.0 || b <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let kernel: f64 = theta
            .iter()
            .map(|t| (a - 1.0) * t.ln() + (b - 1.0) * (1.0 - t).ln())
            .sum();
        pareto_lpdf(kappa, 1.0, 1.5) + kernel - theta.len() as f64 * ln_beta_fn(a, b)
    }

    fn player(phi: f64, kappa: f64, theta: f64, hits: i64, at_bats: i64) -> f64 {
        let (a, b) = (phi * kappa, (1.0 - phi) * kappa);
        (a - 1.0) * theta.ln() + (b - 1.0) * (1.0 - theta).ln()
            + binomial_lpmf(hits.max(0) as u64, at_bats.max(0) as u64, theta)
    }
}

impl LogDensity for BattingDensity {
    fn parameters(&self) -> &[&str] {
        &["phi", "kappa", "theta"]
    }

    fn data_fields(&self) -> &[&str] {
        &["N", "K", "y"]
    }

    fn log_density(&self, params: &Params<'_>, data: &Dataset) -> f64 {
        let (phi, kappa, theta) = (params.scalar("phi"), params.scalar("kappa"), params.get("theta"));
        let likelihood: f64 = theta
            .iter()
            .zip(data.ints("y").iter().zip(data.ints("K")))
            .map(|(t, (y, k))| binomial_lpmf((*y).max(0) as u64, (*k).max(0) as u64, *t))
            .sum();
        Self::population(phi, kappa, theta) + likelihood
    }

    fn conditional_log_density(
        &self,
        params: &Params<'_>,
        data: &Dataset,
        param: &str,
        index: usize,
    ) -> f64 {
        let (phi, kappa, theta) = (params.scalar("phi"), params.scalar("kappa"), params.get("theta"));
        match param {
            "theta" => {
                let (y, k) = (data.ints("y"), data.ints("K"));
                match (theta.get(index), y.get(index), k.get(index)) {
                    (Some(&t), Some(&y), Some(&k)) => Self::player(phi, kappa, t, y, k),
                    _ => f64::NEG_INFINITY,
                }
            }
            _ => Self::population(phi, kappa, theta),
        }
    }
}

/// The batting-ability model.
pub fn spec() -> std::result::Result<ModelSpec, SchemaError> {
    ModelSpec::builder("batting")
        .data(DataDecl::int("N", Shape::Scalar).with_lower(0.0))
        .data(DataDecl::int("K", Shape::vector("N")).with_lower(0.0))
        .data(DataDecl::int("y", Shape::vector("N")).with_lower(0.0))
        .constraint(DataConstraint::le("y", "K"))
        .param(ParamDecl::scalar("phi", Domain::interval(0.0, 1.0)))
        .param(ParamDecl::scalar("kappa", Domain::lower(1.0)))
        .param(ParamDecl::vector("theta", "N", Domain::interval(0.0, 1.0)))
        .density(BattingDensity)
        .generated(GeneratedQuantity::new(
            "some_ability_gt_350",
            Shape::Scalar,
            |params, _, out| {
                let any = params.get("theta").iter().any(|t| *t > ABILITY_THRESHOLD);
                out[0] = f64::from(any);
            },
        ))
        .generated(GeneratedQuantity::new(
            "rank",
            Shape::vector("N"),
            |params, _, out| ranks(params.get("theta"), out),
        ))
        .generated(GeneratedQuantity::new(
            "is_best",
            Shape::vector("N"),
            |params, _, out| {
                let theta = params.get("theta");
                let best = theta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                for (o, t) in out.iter_mut().zip(theta) {
                    *o = f64::from(*t == best);
                }
            },
        ))
        .build()
}

/// `out[n] = 1 + #{m : theta[m] > theta[n]}`.
fn ranks(theta: &[f64], out: &mut [f64]) {
    for (o, t) in out.iter_mut().zip(theta) {
        *o = 1.0 + theta.iter().filter(|other| *other > t).count() as f64;
    }
}

/// The Efron–Morris 1970 batting data.
pub fn efron_morris() -> Dataset {
    let hits: Vec<i64> = EFRON_MORRIS.iter().map(|(_, y)| *y).collect();
    Dataset::new()
        .with_int("N", hits.len() as i64)
        .with_ints("K", vec![EFRON_MORRIS_AT_BATS; hits.len()])
        .with_ints("y", hits)
}

/// Settings for simulating batting data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattingSimulation {
    pub num_players: usize,
    pub at_bats: u64,
    pub phi: f64,
    pub kappa: f64,
}

impl Default for BattingSimulation {
    fn default() -> Self {
        Self {
            num_players: 18,
            at_bats: 45,
            phi: 0.27,
            kappa: 50.0,
        }
    }
}

/// Draws abilities from the population and hits from the abilities.
pub fn simulate<R: Rng + ?Sized>(settings: &BattingSimulation, rng: &mut R) -> Result<Simulated> {
    let BattingSimulation {
        num_players,
        at_bats,
        phi,
        kappa,
    } = *settings;
    let population = Beta::new(phi * kappa, (1.0 - phi) * kappa)
        .map_err(|e| invalid_setting("batting", e))?;

    let mut theta = Vec::with_capacity(num_players);
    let mut hits = Vec::with_capacity(num_players);
    for _ in 0..num_players {
        let t: f64 = population.sample(rng);
        let y = Binomial::new(at_bats, t)
            .map_err(|e| invalid_setting("batting", e))?
            .sample(rng);
        theta.push(t);
        hits.push(y as i64);
    }

    let data = Dataset::new()
        .with_int("N", num_players as i64)
        .with_ints("K", vec![at_bats as i64; num_players])
        .with_ints("y", hits);
    let generating = GeneratingValues::new()
        .with_scalar("phi", phi)
        .with_scalar("kappa", kappa)
        .with("theta", theta);
    Ok(Simulated { data, generating })
}
