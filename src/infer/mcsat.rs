//! MC-SAT marginal inference.
//!
//! Each round samples a subset of the constraints that are good under the
//! current state (soft ones with probability `1 - e^-|w|`, hard ones always),
//! optionally unit-propagates it, and then draws a new state that keeps the
//! whole subset good with SampleSAT (WalkSAT mixed with simulated annealing).
//! Every round yields one sample; marginals are true counts over samples.
//!
//! Chains are independent: chain `k` is seeded with `seed + k`, runs on the
//! rayon pool, and its counts are merged in chain order.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::error::{InferError, MlnResult};
use crate::mrf::{Cost, GroundMrf};
use crate::output::{self, OutputConfig};

use super::state::{Measure, SearchState, SolverGraph};
use super::{InferenceStats, check_positive, check_probability, install};

/// MC-SAT parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McSatConfig {
    /// Samples per chain.
    pub samples: usize,
    /// Independent chains.
    pub chains: usize,
    /// Flip budget of one SampleSAT call.
    pub max_flips: usize,
    /// Probability of a greedy WalkSAT move.
    pub probability_best: f64,
    /// Probability of a simulated-annealing move during the search.
    pub p_sa: f64,
    /// Simulated-annealing temperature.
    pub temperature: f64,
    /// Defer annealing until the active constraints are satisfied, then cool.
    pub late_sa: bool,
    /// Annealing moves once the active constraints are satisfied.
    /// Defaults to one move per atom.
    pub late_sa_steps: Option<usize>,
    /// Geometric temperature decay per late annealing move.
    pub cooling: f64,
    /// Unit-propagate the active constraints before each search.
    pub unit_propagation: bool,
    /// Start from a random assignment instead of all-false.
    pub random_init: bool,
    pub seed: u64,
    /// Worker threads for the chains; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for McSatConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            chains: 1,
            max_flips: 100_000,
            probability_best: 0.5,
            p_sa: 0.1,
            temperature: 0.1,
            late_sa: true,
            late_sa_steps: None,
            cooling: 0.95,
            unit_propagation: true,
            random_init: true,
            seed: 0,
            threads: None,
        }
    }
}

impl McSatConfig {
    /// Reject parameters outside their ranges before any sampling starts.
    pub fn validate(&self) -> Result<(), InferError> {
        check_positive("samples", self.samples)?;
        check_positive("chains", self.chains)?;
        check_positive("max_flips", self.max_flips)?;
        check_probability("probability_best", self.probability_best)?;
        check_probability("p_sa", self.p_sa)?;
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(InferError::InvalidParameter {
                name: "temperature",
                value: self.temperature.to_string(),
                expected: "a finite value > 0",
            });
        }
        if !(self.cooling > 0.0 && self.cooling <= 1.0) {
            return Err(InferError::InvalidParameter {
                name: "cooling",
                value: self.cooling.to_string(),
                expected: "a factor in (0, 1]",
            });
        }
        if let Some(threads) = self.threads {
            check_positive("threads", threads)?;
        }
        Ok(())
    }
}

/// Outcome of one chain.
#[derive(Debug, Clone)]
struct ChainResult {
    counts: Vec<u64>,
    samples: u64,
    flips: u64,
    non_converged: u64,
    conflicts: u64,
    best: Vec<bool>,
    best_cost: Cost,
    cancelled: bool,
}

/// MC-SAT sampler bound to a ground MRF.
pub struct McSat<'m> {
    mrf: &'m mut GroundMrf,
    config: McSatConfig,
    cancel: Arc<AtomicBool>,
}

impl<'m> McSat<'m> {
    /// Validate `config` and bind the sampler to `mrf`.
    pub fn new(mrf: &'m mut GroundMrf, config: McSatConfig) -> MlnResult<Self> {
        config.validate()?;
        Ok(Self {
            mrf,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Setting this flag stops every chain at its next sample boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &McSatConfig {
        &self.config
    }

    pub fn mrf(&self) -> &GroundMrf {
        &*self.mrf
    }

    /// Run every chain and store true counts, sample count and the best
    /// state seen in the MRF.
    pub fn infer(&mut self) -> MlnResult<InferenceStats> {
        let graph = SolverGraph::build(&*self.mrf);
        if let Some(c) = graph.constraints.iter().find(|c| c.weight.is_nan()) {
            return Err(InferError::InvalidParameter {
                name: "constraint weight",
                value: c.weight.to_string(),
                expected: "a number or an infinite hard weight",
            }
            .into());
        }
        let started = Instant::now();
        tracing::info!(
            atoms = graph.atoms(),
            constraints = graph.constraints.len(),
            samples = self.config.samples,
            chains = self.config.chains,
            seed = self.config.seed,
            "starting MC-SAT"
        );

        let config = &self.config;
        let cancel = &self.cancel;
        let graph = &graph;
        let chains: Vec<ChainResult> = install(config.threads, || {
            (0..config.chains)
                .into_par_iter()
                .map(|k| run_chain(graph, config, config.seed.wrapping_add(k as u64), cancel))
                .collect()
        })?;

        let mut counts = vec![0u64; graph.atoms()];
        let mut stats = InferenceStats {
            chains: chains.len(),
            ..InferenceStats::default()
        };
        let mut best: Option<(Cost, &[bool])> = None;
        for chain in &chains {
            for (total, count) in counts.iter_mut().zip(&chain.counts) {
                *total += count;
            }
            stats.samples += chain.samples;
            stats.flips += chain.flips;
            stats.non_converged += chain.non_converged;
            stats.propagation_conflicts += chain.conflicts;
            stats.cancelled |= chain.cancelled;
            if best.is_none_or(|(cost, _)| chain.best_cost.is_better_than(&cost)) {
                best = Some((chain.best_cost, chain.best.as_slice()));
            }
        }

        self.mrf.record_samples(&counts, stats.samples);
        if let Some((cost, state)) = best {
            stats.best_cost = cost;
            for (atom, &value) in self.mrf.atoms_mut().iter_mut().zip(state) {
                atom.state = value;
            }
        }

        if stats.non_converged > 0 {
            tracing::warn!(
                rounds = stats.non_converged,
                max_flips = self.config.max_flips,
                "SampleSAT did not satisfy the sampled constraints in some rounds"
            );
        }
        tracing::info!(
            samples = stats.samples,
            flips = stats.flips,
            non_converged = stats.non_converged,
            conflicts = stats.propagation_conflicts,
            best_hard = stats.best_cost.hard,
            best_soft = stats.best_cost.soft,
            cancelled = stats.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "MC-SAT finished"
        );
        Ok(stats)
    }

    /// Estimated marginal of an atom.
    pub fn marginal(&self, id: AtomId) -> f64 {
        self.mrf.marginal(id)
    }

    /// Write marginals with the default output settings.
    pub fn write_marginals(&self, sink: impl Write) -> MlnResult<()> {
        self.write_marginals_with(sink, &OutputConfig::default())
    }

    pub fn write_marginals_with(&self, sink: impl Write, config: &OutputConfig) -> MlnResult<()> {
        output::write_marginals(&*self.mrf, sink, config)
    }
}

fn run_chain(
    graph: &SolverGraph,
    config: &McSatConfig,
    seed: u64,
    cancel: &AtomicBool,
) -> ChainResult {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = SearchState::initial_truth(graph, config.random_init, &mut rng);
    let mut state = SearchState::new(graph, truth, Measure::Count);

    // Start from a state satisfying the hard constraints when possible.
    state.set_active(|_, c, _| c.is_hard());
    let mut flips = 0u64;
    let mut budget = config.max_flips;
    while state.unsat_len() > 0 && budget > 0 {
        if state.walk_step(&mut rng, config.probability_best) {
            flips += 1;
        }
        budget -= 1;
    }
    if state.unsat_len() > 0 {
        tracing::warn!(
            seed,
            violated = state.unsat_len(),
            "initial state violates hard constraints"
        );
    }

    let mut result = ChainResult {
        counts: vec![0; graph.atoms()],
        samples: 0,
        flips,
        non_converged: 0,
        conflicts: 0,
        best_cost: state.full_cost(),
        best: state.truth().to_vec(),
        cancelled: false,
    };

    for sample in 0..config.samples {
        if cancel.load(Ordering::Relaxed) {
            result.cancelled = true;
            tracing::debug!(seed, sample, "chain cancelled");
            break;
        }

        state.clear_fixed();
        state.set_active(|_, c, good| {
            c.is_hard() || (good && rng.gen_bool(1.0 - (-c.weight.abs()).exp()))
        });

        if config.unit_propagation {
            match propagate(&state, graph) {
                Some(assigned) => {
                    for (atom, value) in assigned.into_iter().enumerate() {
                        if let Some(value) = value {
                            state.fix(atom, value);
                        }
                    }
                }
                None => {
                    result.conflicts += 1;
                    tracing::debug!(seed, sample, "unit propagation conflict, fixes discarded");
                }
            }
        }

        if !sample_sat(&mut state, config, &mut rng, &mut result.flips) {
            result.non_converged += 1;
            tracing::debug!(
                seed,
                sample,
                unsatisfied = state.unsat_len(),
                "SampleSAT ran out of flips, keeping the sample"
            );
        }

        for (count, &value) in result.counts.iter_mut().zip(state.truth()) {
            if value {
                *count += 1;
            }
        }
        result.samples += 1;

        let cost = state.full_cost();
        if cost.is_better_than(&result.best_cost) {
            result.best_cost = cost;
            result.best.copy_from_slice(state.truth());
        }
    }
    result
}

/// Unit propagation over the active constraints.
///
/// Returns the forced value of every atom reached, or `None` on a conflict.
/// An active positive constraint with a single open literal forces it true;
/// an active negative constraint must stay unsatisfied, so all of its
/// literals are forced false.
fn propagate(state: &SearchState<'_>, graph: &SolverGraph) -> Option<Vec<Option<bool>>> {
    let mut assigned: Vec<Option<bool>> = vec![None; graph.atoms()];
    let mut changed = true;
    while changed {
        changed = false;
        for (c, constraint) in graph.constraints.iter().enumerate() {
            if !state.is_active(c) {
                continue;
            }
            if constraint.weight >= 0.0 {
                let mut open = None;
                let mut n_open = 0;
                let mut satisfied = false;
                for &(atom, positive) in &constraint.literals {
                    match assigned[atom] {
                        Some(value) if value == positive => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            n_open += 1;
                            open = Some((atom, positive));
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (n_open, open) {
                    (0, _) => return None,
                    (1, Some((atom, positive))) => {
                        assigned[atom] = Some(positive);
                        changed = true;
                    }
                    _ => {}
                }
            } else {
                for &(atom, positive) in &constraint.literals {
                    match assigned[atom] {
                        Some(value) if value == positive => return None,
                        Some(_) => {}
                        None => {
                            assigned[atom] = Some(!positive);
                            changed = true;
                        }
                    }
                }
            }
        }
    }
    Some(assigned)
}

/// Draw a state keeping every active constraint good. Returns `false` when
/// the flip budget ran out first.
fn sample_sat(
    state: &mut SearchState<'_>,
    config: &McSatConfig,
    rng: &mut StdRng,
    flips: &mut u64,
) -> bool {
    let mut budget = config.max_flips;
    while state.unsat_len() > 0 && budget > 0 {
        let moved = if !config.late_sa && rng.gen_bool(config.p_sa) {
            state.anneal_step(rng, config.temperature)
        } else {
            state.walk_step(rng, config.probability_best)
        };
        if moved {
            *flips += 1;
        }
        budget -= 1;
    }
    if state.unsat_len() > 0 {
        return false;
    }

    // Annealing over the satisfied set randomises atoms no active
    // constraint pins down.
    let steps = config.late_sa_steps.unwrap_or(state.truth().len());
    let mut temperature = config.temperature;
    for _ in 0..steps {
        if state.anneal_step(rng, temperature) {
            *flips += 1;
        }
        if config.late_sa {
            temperature = (temperature * config.cooling).max(f64::MIN_POSITIVE);
        }
    }

    while state.unsat_len() > 0 && budget > 0 {
        if state.walk_step(rng, config.probability_best) {
            *flips += 1;
        }
        budget -= 1;
    }
    state.unsat_len() == 0
}
