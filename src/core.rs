//! Chain runner: runs independent, deterministically seeded chains of a
//! model against a dataset and collects them into a [`RunResult`].

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::distributions::Target;
use crate::error::SamplingError;
use crate::metropolis_hastings::{AdaptiveMetropolis, Sampler};
use crate::model::{Domain, ModelSpec, ParamLayout, Params};

pub trait MarkovChain<S> {
    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> &Vec<S>;

    /// Get the current state without stepping.
    fn current_state(&self) -> &Vec<S>;

    /// Log-density of the current state.
    fn log_density(&self) -> f64;

    /// Called once, before the first post-warm-up iteration.
    fn end_warmup(&mut self) {}
}

/// Runs `chain` for `n_steps` iterations, the first `n_warmup` of them
/// warm-up, and returns the states (one row each) and their log-densities.
pub fn run_chain_with_progress<M>(
    chain: &mut M,
    n_steps: usize,
    n_warmup: usize,
    pb: Option<&ProgressBar>,
) -> (Array2<f64>, Vec<f64>)
where
    M: MarkovChain<f64>,
{
    let dim = chain.current_state().len();
    let mut out = Array2::<f64>::zeros((n_steps, dim));
    let mut log_density = Vec::with_capacity(n_steps);

    if let Some(pb) = pb {
        pb.set_length(n_steps as u64);
    }

    for i in 0..n_steps {
        if i == n_warmup {
            chain.end_warmup();
        }
        let state = chain.step();
        out.row_mut(i).assign(&ArrayView1::from(state.as_slice()));
        log_density.push(chain.log_density());

        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    (out, log_density)
}

/// How many chains to run and for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub num_chains: usize,
    /// Total iterations per chain, warm-up included.
    pub num_iterations: usize,
    pub num_warmup: usize,
    /// Chain `i` is seeded with `seed + i`.
    pub seed: u64,
    /// Run chains on the rayon pool.
    pub parallel: bool,
    /// Show one progress bar per chain.
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_chains: 4,
            num_iterations: 2_000,
            num_warmup: 1_000,
            seed: 42,
            parallel: true,
            progress: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.num_chains == 0 {
            return Err(SamplingError::NoChains);
        }
        if self.num_warmup >= self.num_iterations {
            return Err(SamplingError::WarmupTooLong {
                warmup: self.num_warmup,
                iterations: self.num_iterations,
            });
        }
        Ok(())
    }

    /// Seed of chain `index`.
    pub fn chain_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }
}

/// A model conditioned on a dataset, as seen by a [`Sampler`].
pub struct ModelTarget<'a> {
    spec: &'a ModelSpec,
    data: &'a Dataset,
    layout: &'a ParamLayout,
}

impl<'a> ModelTarget<'a> {
    pub fn new(spec: &'a ModelSpec, data: &'a Dataset, layout: &'a ParamLayout) -> Self {
        Self { spec, data, layout }
    }
}

impl Target for ModelTarget<'_> {
    fn dim(&self) -> usize {
        self.layout.dim()
    }

    fn domain(&self, coord: usize) -> Domain {
        self.layout.domain(coord)
    }

    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        self.spec.log_density(self.layout, theta, self.data)
    }

    fn conditional_log_prob(&self, theta: &[f64], coord: usize) -> f64 {
        let (entry, component) = self.layout.locate(coord);
        self.spec.density().conditional_log_density(
            &Params::new(self.layout, theta),
            self.data,
            &entry.name,
            component,
        )
    }

    fn coord_name(&self, coord: usize) -> String {
        let (entry, component) = self.layout.locate(coord);
        entry.shape.component_name(&entry.name, component)
    }
}

/// One draw of a chain: constrained parameter values and their log-density.
#[derive(Debug, Clone, Copy)]
pub struct Draw<'a> {
    values: ArrayView1<'a, f64>,
    log_density: f64,
    warmup: bool,
    layout: &'a ParamLayout,
}

impl<'a> Draw<'a> {
    /// Components of parameter `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<ArrayView1<'a, f64>> {
        let range = self.layout.entry(name)?.range();
        Some(self.values.slice_move(s![range]))
    }

    pub fn values(&self) -> ArrayView1<'a, f64> {
        self.values
    }

    pub fn log_density(&self) -> f64 {
        self.log_density
    }

    pub fn is_warmup(&self) -> bool {
        self.warmup
    }

    /// Parameter name to its components.
    pub fn to_map(&self) -> BTreeMap<String, Vec<f64>> {
        self.layout
            .entries()
            .iter()
            .map(|e| (e.name.clone(), self.values.slice(s![e.range()]).to_vec()))
            .collect()
    }
}

/// The draws of one chain, frozen once the chain has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    index: usize,
    seed: u64,
    draws: Array2<f64>,
    log_density: Vec<f64>,
    n_warmup: usize,
    acceptance_rate: f64,
    layout: Arc<ParamLayout>,
}

impl Chain {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws, warm-up included.
    pub fn len(&self) -> usize {
        self.draws.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_warmup(&self) -> usize {
        self.n_warmup
    }

    /// Fraction of proposals accepted after warm-up.
    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance_rate
    }

    pub fn draw(&self, i: usize) -> Option<Draw<'_>> {
        (i < self.len()).then(|| Draw {
            values: self.draws.row(i),
            log_density: self.log_density[i],
            warmup: i < self.n_warmup,
            layout: &self.layout,
        })
    }

    /// All draws in order.
    pub fn draws(&self) -> impl Iterator<Item = Draw<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.draw(i))
    }

    /// `iterations × dim` matrix of parameter values.
    pub fn samples(&self, discard_warmup: bool) -> ArrayView2<'_, f64> {
        let start = if discard_warmup { self.n_warmup } else { 0 };
        self.draws.slice(s![start.., ..])
    }

    pub fn log_densities(&self) -> &[f64] {
        &self.log_density
    }
}

/// Everything a run produced, together with the model and data it used.
#[derive(Debug, Clone)]
pub struct RunResult {
    spec: ModelSpec,
    data: Dataset,
    layout: Arc<ParamLayout>,
    chains: Vec<Chain>,
    num_iterations: usize,
    num_warmup: usize,
    seed: u64,
}

impl RunResult {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    pub fn num_warmup(&self) -> usize {
        self.num_warmup
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generated quantity `name` for every draw of every chain, one
    /// `iterations × len` matrix per chain. `None` if `name` is not declared.
    pub fn generated(&self, name: &str) -> Option<Vec<Array2<f64>>> {
        let entry = self.layout.generated_entry(name)?;
        let quantity = self.spec.generated().iter().find(|g| g.name == name)?;
        let out = self
            .chains
            .par_iter()
            .map(|chain| {
                let mut values = Array2::<f64>::zeros((chain.len(), entry.len()));
                let mut buf = vec![0.0; entry.len()];
                for (draw, mut row) in chain.draws.outer_iter().zip(values.outer_iter_mut()) {
                    let theta = draw.to_vec();
                    buf.iter_mut().for_each(|b| *b = 0.0);
                    quantity.compute(&Params::new(&self.layout, &theta), &self.data, &mut buf);
                    row.assign(&ArrayView1::from(buf.as_slice()));
                }
                values
            })
            .collect();
        Some(out)
    }

    /// Names of every scalar component of every parameter and generated
    /// quantity, followed by one `draws × components` matrix per chain.
    pub fn component_draws(&self, discard_warmup: bool) -> (Vec<String>, Vec<Array2<f64>>) {
        let mut names = self.layout.component_names();
        names.extend(self.layout.generated_component_names());

        let generated: Vec<Vec<Array2<f64>>> = self
            .layout
            .generated_entries()
            .iter()
            .filter_map(|e| self.generated(&e.name))
            .collect();

        // Every block of chain `c` has `chain.len() - start` rows, and the
        // column widths add up to `names.len()`.
        let start = if discard_warmup { self.num_warmup } else { 0 };
        let matrices = self
            .chains
            .iter()
            .enumerate()
            .map(|(c, chain)| {
                let params = chain.samples(discard_warmup);
                let mut out = Array2::<f64>::zeros((params.nrows(), names.len()));
                let mut col = params.ncols();
                out.slice_mut(s![.., ..col]).assign(&params);
                for g in &generated {
                    let block = g[c].slice(s![start.., ..]);
                    out.slice_mut(s![.., col..col + block.ncols()]).assign(&block);
                    col += block.ncols();
                }
                out
            })
            .collect();
        (names, matrices)
    }
}

/// Runs `config.num_chains` chains of the default [`AdaptiveMetropolis`]
/// sampler.
pub fn run(spec: &ModelSpec, data: &Dataset, config: &RunConfig) -> Result<RunResult, SamplingError> {
    run_with(&AdaptiveMetropolis::default(), spec, data, config)
}

/// Runs `config.num_chains` chains of `sampler`.
///
/// Chain `i` is seeded with `config.seed + i`, so the result does not
/// depend on `config.parallel` or on thread scheduling.
pub fn run_with<S: Sampler>(
    sampler: &S,
    spec: &ModelSpec,
    data: &Dataset,
    config: &RunConfig,
) -> Result<RunResult, SamplingError> {
    config.validate()?;
    spec.validate(data)?;
    let layout = Arc::new(spec.layout(data)?);
    let target = ModelTarget::new(spec, data, &layout);

    log::info!(
        "sampling model `{}`: {} chains × {} iterations ({} warm-up), {} parameters",
        spec.name(),
        config.num_chains,
        config.num_iterations,
        config.num_warmup,
        layout.dim()
    );

    let multi = config.progress.then(MultiProgress::new);
    let pb_style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let run_one = |index: usize| -> Result<Chain, SamplingError> {
        let seed = config.chain_seed(index);
        let pb = multi.as_ref().map(|multi| {
            let pb = multi.add(ProgressBar::new(config.num_iterations as u64));
            pb.set_prefix(format!("Chain {index}"));
            pb.set_style(pb_style.clone());
            pb
        });

        let out = sampler.sample(
            &target,
            config.num_iterations,
            config.num_warmup,
            seed,
            index,
            pb.as_ref(),
        )?;

        if let Some(pb) = &pb {
            pb.finish_with_message("Done!");
        }
        log::debug!(
            "chain {index} (seed {seed}): acceptance rate {:.3}",
            out.acceptance_rate
        );

        Ok(Chain {
            index,
            seed,
            draws: out.draws,
            log_density: out.log_density,
            n_warmup: config.num_warmup,
            acceptance_rate: out.acceptance_rate,
            layout: Arc::clone(&layout),
        })
    };

    let chains = if config.parallel {
        (0..config.num_chains)
            .into_par_iter()
            .map(run_one)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        (0..config.num_chains)
            .map(run_one)
            .collect::<Result<Vec<_>, _>>()?
    };

    log::info!("finished sampling model `{}`", spec.name());

    Ok(RunResult {
        spec: spec.clone(),
        data: data.clone(),
        layout,
        chains,
        num_iterations: config.num_iterations,
        num_warmup: config.num_warmup,
        seed: config.seed,
    })
}
