//! MaxWalkSAT: stochastic local search for a most probable state.
//!
//! Minimises the summed `|w|` of constraints not in their preferred state,
//! with hard constraints weighted above the total soft weight. Runs
//! `max_tries` restarts of `max_flips` moves each and keeps the best state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{InferError, MlnResult};
use crate::mrf::{Cost, GroundMrf};

use super::state::{Measure, SearchState, SolverGraph};
use super::{InferenceStats, check_positive, check_probability};

/// MaxWalkSAT parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxWalkSatConfig {
    /// Restarts.
    pub max_tries: usize,
    /// Moves per try.
    pub max_flips: usize,
    /// Probability of a greedy move.
    pub probability_best: f64,
    /// Stop once no hard constraint is violated and the soft cost is at most this.
    pub target_cost: f64,
    /// Start every try from a random assignment instead of all-false.
    pub random_init: bool,
    pub seed: u64,
}

impl Default for MaxWalkSatConfig {
    fn default() -> Self {
        Self {
            max_tries: 10,
            max_flips: 100_000,
            probability_best: 0.5,
            target_cost: 0.001,
            random_init: true,
            seed: 0,
        }
    }
}

impl MaxWalkSatConfig {
    pub fn validate(&self) -> Result<(), InferError> {
        check_positive("max_tries", self.max_tries)?;
        check_positive("max_flips", self.max_flips)?;
        check_probability("probability_best", self.probability_best)?;
        if !(self.target_cost >= 0.0 && self.target_cost.is_finite()) {
            return Err(InferError::InvalidParameter {
                name: "target_cost",
                value: self.target_cost.to_string(),
                expected: "a finite value >= 0",
            });
        }
        Ok(())
    }
}

/// MAP search bound to a ground MRF.
pub struct MaxWalkSat<'m> {
    mrf: &'m mut GroundMrf,
    config: MaxWalkSatConfig,
    cancel: Arc<AtomicBool>,
}

impl<'m> MaxWalkSat<'m> {
    pub fn new(mrf: &'m mut GroundMrf, config: MaxWalkSatConfig) -> MlnResult<Self> {
        config.validate()?;
        Ok(Self {
            mrf,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Search and write the best state found into the MRF atom states.
    pub fn infer(&mut self) -> MlnResult<InferenceStats> {
        let graph = SolverGraph::build(&*self.mrf);
        let started = Instant::now();
        let config = &self.config;
        tracing::info!(
            atoms = graph.atoms(),
            constraints = graph.constraints.len(),
            tries = config.max_tries,
            flips = config.max_flips,
            seed = config.seed,
            "starting MaxWalkSAT"
        );

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut stats = InferenceStats::default();
        let mut best: Option<(Cost, Vec<bool>)> = None;
        'tries: for attempt in 0..config.max_tries {
            let truth = SearchState::initial_truth(&graph, config.random_init, &mut rng);
            let mut state = SearchState::new(&graph, truth, Measure::Weighted);
            state.set_active(|_, _, _| true);
            stats.chains += 1;

            let mut try_best = state.full_cost();
            let mut try_state = state.truth().to_vec();
            for _ in 0..config.max_flips {
                if reached(&state.active_cost(), config.target_cost) {
                    break;
                }
                if self.cancel.load(Ordering::Relaxed) {
                    stats.cancelled = true;
                    break;
                }
                if !state.walk_step(&mut rng, config.probability_best) {
                    break;
                }
                stats.flips += 1;
                if state.active_cost().is_better_than(&try_best) {
                    // The incremental cost drifts; confirm with a full pass.
                    let exact = state.full_cost();
                    if exact.is_better_than(&try_best) {
                        try_best = exact;
                        try_state.copy_from_slice(state.truth());
                    }
                }
            }

            tracing::debug!(
                attempt,
                hard = try_best.hard,
                soft = try_best.soft,
                "MaxWalkSAT try finished"
            );
            if best.as_ref().is_none_or(|(cost, _)| try_best.is_better_than(cost)) {
                best = Some((try_best, try_state));
            }
            let done = best
                .as_ref()
                .is_some_and(|(cost, _)| reached(cost, config.target_cost));
            if done || stats.cancelled {
                break 'tries;
            }
        }

        if let Some((cost, state)) = best {
            stats.best_cost = cost;
            for (atom, value) in self.mrf.atoms_mut().iter_mut().zip(state) {
                atom.state = value;
            }
        }
        if stats.best_cost.hard > 0 {
            tracing::warn!(
                violated = stats.best_cost.hard,
                "best state found violates hard constraints"
            );
        }
        tracing::info!(
            tries = stats.chains,
            flips = stats.flips,
            best_hard = stats.best_cost.hard,
            best_soft = stats.best_cost.soft,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "MaxWalkSAT finished"
        );
        Ok(stats)
    }
}

fn reached(cost: &Cost, target: f64) -> bool {
    cost.hard == 0 && cost.soft <= target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domains;
    use crate::evidence::EvidenceBuilder;
    use crate::ground::ground_network;
    use crate::identity::IdentityEncoder;
    use crate::logic::{Atom, AtomSignature, Literal, Schema, Term, WeightedClause};

    fn network(clauses: Vec<WeightedClause>) -> GroundMrf {
        let domains = Domains::new().with("node", ["a", "b", "c"]);
        let schema = Schema::new().predicate("On", ["node"]);
        let encoder = Arc::new(IdentityEncoder::new(&schema, Arc::new(domains)).unwrap());
        let evidence = EvidenceBuilder::new(encoder)
            .query(AtomSignature::new("On", 1))
            .build()
            .unwrap();
        ground_network(clauses, Arc::new(evidence), &[AtomSignature::new("On", 1)]).unwrap()
    }

    fn on(t: Term) -> Atom {
        Atom::new("On", vec![t])
    }

    #[test]
    fn finds_the_optimum_of_a_small_network() {
        let mut mrf = network(vec![
            WeightedClause::soft(0, 1.0, vec![Literal::pos(on(Term::var("x")))]),
            WeightedClause::hard(1, vec![Literal::neg(on(Term::constant("b")))]),
            WeightedClause::soft(
                2,
                2.0,
                vec![Literal::neg(on(Term::constant("a"))), Literal::neg(on(Term::constant("c")))],
            ),
        ]);
        let config = MaxWalkSatConfig {
            max_tries: 3,
            max_flips: 2_000,
            seed: 5,
            ..Default::default()
        };
        let stats = MaxWalkSat::new(&mut mrf, config)
            .unwrap()
            .infer()
            .unwrap();
        // Optimum: b false (hard) and exactly one of a/c true, which leaves
        // one unit prior violated.
        assert_eq!(stats.best_cost.hard, 0);
        assert!((stats.best_cost.soft - 1.0).abs() < 1e-9);
        assert_eq!(mrf.cost(), stats.best_cost);
        let true_count = mrf.atoms().iter().filter(|a| a.state).count();
        assert_eq!(true_count, 1);
    }

    #[test]
    fn stops_at_target_cost() {
        let mut mrf = network(vec![WeightedClause::soft(
            0,
            1.0,
            vec![Literal::pos(on(Term::var("x")))],
        )]);
        let stats = MaxWalkSat::new(&mut mrf, MaxWalkSatConfig::default())
            .unwrap()
            .infer()
            .unwrap();
        assert_eq!(stats.chains, 1);
        assert!(mrf.atoms().iter().all(|a| a.state));
        assert_eq!(mrf.cost(), Cost::default());
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut mrf = network(vec![]);
        let config = MaxWalkSatConfig {
            target_cost: -1.0,
            ..Default::default()
        };
        assert!(MaxWalkSat::new(&mut mrf, config).is_err());
    }
}
