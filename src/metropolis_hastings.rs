/*!
# Adaptive component-wise Metropolis sampler

[`AdaptiveMetropolis`] is the default [`Sampler`]: a random-walk Metropolis
sampler that updates one coordinate at a time on the unconstrained scale.

## Overview

- **Unconstrained moves**: each coordinate `u_k` gets a Gaussian proposal
  `u_k' = u_k + s_k ε`. The candidate is mapped back with
  [`Target::constrain`] and accepted with the Metropolis ratio of the
  conditional log-density plus the log-Jacobian of the transform, so a draw
  can never leave its declared domain.
- **Warm-up adaptation**: during warm-up every `log s_k` follows a
  Robbins–Monro update towards the target acceptance rate. Scales are frozen
  when warm-up ends, so post-warm-up draws come from a fixed kernel that
  leaves the posterior invariant.
- **Reproducibility**: a chain is a pure function of the target, the
  iteration counts and its seed.

## Example

```rust
use posterior_pipeline::distributions::{normal_lpdf, Target};
use posterior_pipeline::metropolis_hastings::{AdaptiveMetropolis, Sampler};
use posterior_pipeline::transform::Domain;

struct StdNormal;

impl Target for StdNormal {
    fn dim(&self) -> usize {
        1
    }
    fn domain(&self, _coord: usize) -> Domain {
        Domain::Real
    }
    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        normal_lpdf(theta[0], 0.0, 1.0)
    }
}

let out = AdaptiveMetropolis::default()
    .sample(&StdNormal, 2_000, 500, 42, 0, None)
    .unwrap();
assert_eq!(out.draws.nrows(), 2_000);
assert!(out.acceptance_rate > 0.2 && out.acceptance_rate < 0.7);
```
*/

use indicatif::ProgressBar;
use ndarray::Array2;
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::core::{run_chain_with_progress, MarkovChain};
use crate::distributions::Target;
use crate::error::SamplingError;

/// What a [`Sampler`] hands back for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    /// `iterations × dim` constrained draws, warm-up included.
    pub draws: Array2<f64>,
    /// Log-density of every draw.
    pub log_density: Vec<f64>,
    /// Fraction of post-warm-up proposals accepted.
    pub acceptance_rate: f64,
}

/// Produces one chain of draws from a [`Target`].
///
/// Implementations must be deterministic in `seed` and must only emit
/// points inside every coordinate's domain.
pub trait Sampler: Sync {
    fn sample<T: Target + ?Sized>(
        &self,
        target: &T,
        n_iterations: usize,
        n_warmup: usize,
        seed: u64,
        chain: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<ChainOutput, SamplingError>;
}

/// Settings of the adaptive component-wise random-walk Metropolis sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveMetropolis {
    /// Starting proposal standard deviation on the unconstrained scale.
    pub initial_scale: f64,
    /// Per-coordinate acceptance rate aimed for during warm-up.
    pub target_acceptance: f64,
    /// Initial points are drawn uniformly from `[-init_radius, init_radius]`.
    pub init_radius: f64,
    pub max_init_attempts: usize,
    /// Exponent `κ` of the adaptation step size `(t + 1)^-κ`.
    pub adaptation_decay: f64,
}

impl Default for AdaptiveMetropolis {
    fn default() -> Self {
        Self {
            initial_scale: 0.5,
            target_acceptance: 0.44,
            init_radius: 2.0,
            max_init_attempts: 100,
            adaptation_decay: 0.6,
        }
    }
}

impl Sampler for AdaptiveMetropolis {
    fn sample<T: Target + ?Sized>(
        &self,
        target: &T,
        n_iterations: usize,
        n_warmup: usize,
        seed: u64,
        chain: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<ChainOutput, SamplingError> {
        let mut mc = MHMarkovChain::new(target, self, seed)
            .ok_or(SamplingError::Initialization {
                chain,
                attempts: self.max_init_attempts,
            })?;
        let (draws, log_density) = run_chain_with_progress(&mut mc, n_iterations, n_warmup, progress);

        for (iteration, (row, lp)) in draws.outer_iter().zip(&log_density).enumerate() {
            if let Some(coord) = row.iter().position(|x| !x.is_finite()) {
                return Err(SamplingError::NonFinite {
                    chain,
                    iteration,
                    parameter: target.coord_name(coord),
                });
            }
            if !lp.is_finite() {
                return Err(SamplingError::NonFinite {
                    chain,
                    iteration,
                    parameter: "lp__".to_string(),
                });
            }
        }

        Ok(ChainOutput {
            draws,
            log_density,
            acceptance_rate: mc.acceptance_rate(),
        })
    }
}

/// One chain of the component-wise sampler.
///
/// Keeps the unconstrained point, its constrained image and the per-coordinate
/// log-Jacobians in step, so a sweep costs one conditional density
/// evaluation per coordinate.
pub struct MHMarkovChain<'a, T: Target + ?Sized> {
    target: &'a T,
    settings: &'a AdaptiveMetropolis,
    unconstrained: Vec<f64>,
    current_state: Vec<f64>,
    log_jac: Vec<f64>,
    log_scale: Vec<f64>,
    rng: SmallRng,
    adapting: bool,
    sweeps: usize,
    accepted: usize,
    proposed: usize,
}

impl<'a, T: Target + ?Sized> MHMarkovChain<'a, T> {
    /// Seeds the chain and finds a starting point with finite log-density.
    ///
    /// Returns `None` when `max_init_attempts` uniform draws all fail.
    pub fn new(target: &'a T, settings: &'a AdaptiveMetropolis, seed: u64) -> Option<Self> {
        let dim = target.dim();
        let mut rng = SmallRng::seed_from_u64(seed);
        let radius = settings.init_radius.abs();

        for attempt in 0..settings.max_init_attempts.max(1) {
            let unconstrained: Vec<f64> = (0..dim)
                .map(|_| {
                    if radius > 0.0 {
                        rng.gen_range(-radius..=radius)
                    } else {
                        0.0
                    }
                })
                .collect();
            let (current_state, log_jac): (Vec<f64>, Vec<f64>) = unconstrained
                .iter()
                .enumerate()
                .map(|(k, &u)| target.constrain(k, u))
                .unzip();
            let lp = target.unnorm_log_prob(&current_state);
            if lp.is_finite() {
                log::trace!("initial point found after {} attempt(s)", attempt + 1);
                return Some(Self {
                    target,
                    settings,
                    unconstrained,
                    current_state,
                    log_jac,
                    log_scale: vec![settings.initial_scale.ln(); dim],
                    rng,
                    adapting: true,
                    sweeps: 0,
                    accepted: 0,
                    proposed: 0,
                });
            }
        }
        None
    }

    /// Fraction of accepted proposals since adaptation stopped.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    /// Current proposal standard deviations.
    pub fn scales(&self) -> Vec<f64> {
        self.log_scale.iter().map(|s| s.exp()).collect()
    }

    fn update_coordinate(&mut self, k: usize, step_size: f64) {
        let current = self.target.conditional_log_prob(&self.current_state, k) + self.log_jac[k];

        let eps: f64 = self.rng.sample(StandardNormal);
        let u_new = self.unconstrained[k] + self.log_scale[k].exp() * eps;
        let (x_new, jac_new) = self.target.constrain(k, u_new);

        let x_old = self.current_state[k];
        self.current_state[k] = x_new;
        let proposed = self.target.conditional_log_prob(&self.current_state, k) + jac_new;

        let log_alpha = proposed - current;
        let log_u = self.rng.gen::<f64>().ln();
        let accept = x_new.is_finite() && proposed.is_finite() && log_u < log_alpha;

        if accept {
            self.unconstrained[k] = u_new;
            self.log_jac[k] = jac_new;
        } else {
            self.current_state[k] = x_old;
        }

        if self.adapting {
            let alpha = if log_alpha.is_nan() {
                0.0
            } else {
                log_alpha.min(0.0).exp()
            };
            let s = self.log_scale[k] + step_size * (alpha - self.settings.target_acceptance);
            self.log_scale[k] = s.clamp(-12.0, 6.0);
        } else {
            self.proposed += 1;
            self.accepted += accept as usize;
        }
    }
}

impl<T: Target + ?Sized> MarkovChain<f64> for MHMarkovChain<'_, T> {
    /// One sweep over all coordinates in order.
    fn step(&mut self) -> &Vec<f64> {
        let step_size = (self.sweeps as f64 + 1.0).powf(-self.settings.adaptation_decay);
        for k in 0..self.current_state.len() {
            self.update_coordinate(k, step_size);
        }
        if self.adapting {
            self.sweeps += 1;
        }
        &self.current_state
    }

    fn current_state(&self) -> &Vec<f64> {
        &self.current_state
    }

    fn log_density(&self) -> f64 {
        self.target.unnorm_log_prob(&self.current_state)
    }

    fn end_warmup(&mut self) {
        self.adapting = false;
        log::trace!("proposal scales frozen: {:?}", self.scales());
    }
}
