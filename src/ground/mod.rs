//! Grounding engine: first-order clauses + evidence → ground MRF.
//!
//! Every clause is compiled once (see [`compile`]), then its substitution space
//! is cut into chunks that are grounded in parallel with rayon. Each
//! substitution is simplified against the evidence:
//!
//! - a literal that is true under the evidence satisfies the ground clause, which is dropped
//! - a literal that is false under the evidence is removed
//! - unknown literals remain
//!
//! Surviving ground clauses are deduplicated in a concurrent table. The
//! table is drained in sorted order before constraint ids are handed out, so
//! the resulting MRF does not depend on thread scheduling.

mod cache;
mod compile;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::builtins::BuiltinRegistry;
use crate::error::{GroundingError, MlnResult};
use crate::evidence::Evidence;
use crate::logic::{AtomSignature, Weight, WeightedClause};
use crate::mrf::{
    ClauseDependency, Constraint, DependencyMap, GroundAtom, GroundMrf, GroundingStats,
    constraint_weight,
};

use cache::{ConstraintCache, Entry};
use compile::{CompiledClause, Outcome};

/// Tuning knobs of the grounding engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundingConfig {
    /// Ground substitution chunks on the rayon pool.
    pub parallel: bool,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Substitutions per parallel work item.
    pub chunk_size: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            chunk_size: 4096,
        }
    }
}

/// One slice of a clause's substitution space.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    clause: usize,
    start: u64,
    end: u64,
}

/// Grounds first-order clauses against evidence.
#[derive(Debug, Clone)]
pub struct GroundingEngine {
    config: GroundingConfig,
    builtins: Arc<BuiltinRegistry>,
}

impl Default for GroundingEngine {
    fn default() -> Self {
        Self::new(GroundingConfig::default())
    }
}

impl GroundingEngine {
    /// An engine using the standard builtins.
    pub fn new(config: GroundingConfig) -> Self {
        Self {
            config,
            builtins: Arc::new(BuiltinRegistry::standard()),
        }
    }

    /// Replace the builtin registry.
    pub fn with_builtins(mut self, builtins: Arc<BuiltinRegistry>) -> Self {
        self.builtins = builtins;
        self
    }

    pub fn config(&self) -> &GroundingConfig {
        &self.config
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Ground `clauses` against `evidence`.
    ///
    /// Unknown atoms of the `query` signatures become MRF atoms even when no
    /// constraint mentions them, so every query atom gets a marginal.
    pub fn ground(
        &self,
        clauses: impl Into<Arc<Vec<WeightedClause>>>,
        evidence: Arc<Evidence>,
        query: &[AtomSignature],
    ) -> MlnResult<GroundMrf> {
        let clauses: Arc<Vec<WeightedClause>> = clauses.into();
        check_clauses(&clauses)?;
        for signature in query {
            evidence
                .encoder()
                .identity(signature)
                .map_err(GroundingError::from)?;
        }

        let compiled = clauses
            .iter()
            .map(|clause| compile::compile(clause, &evidence, &self.builtins))
            .collect::<Result<Vec<_>, _>>()?;

        let mut chunks = Vec::new();
        let chunk_size = self.config.chunk_size.max(1) as u64;
        let mut substitutions: u64 = 0;
        for (k, clause) in compiled.iter().enumerate() {
            let total = clause.substitutions()?;
            substitutions = substitutions.saturating_add(total);
            tracing::debug!(
                clause = clause.clause.index,
                variables = clause.vars.len(),
                substitutions = total,
                "compiled clause"
            );
            let mut start = 0;
            while start < total {
                let end = total.min(start + chunk_size);
                chunks.push(Chunk {
                    clause: k,
                    start,
                    end,
                });
                start = end;
            }
        }
        tracing::info!(
            clauses = compiled.len(),
            substitutions,
            chunks = chunks.len(),
            parallel = self.config.parallel,
            "grounding clauses"
        );

        let cache = ConstraintCache::new();
        let abort = AtomicBool::new(false);
        let run = |chunk: &Chunk| ground_chunk(&compiled[chunk.clause], chunk, &cache, &abort);
        let results: Vec<Result<GroundingStats, GroundingError>> = if self.config.parallel {
            self.install(|| chunks.par_iter().map(run).collect())?
        } else {
            chunks.iter().map(run).collect()
        };
        let mut stats = GroundingStats::default();
        for result in results {
            stats += result?;
        }
        drop(compiled);

        tracing::debug!(entries = cache.len(), "deduplicated ground clauses");
        let (constraints, dependencies) = finalise(cache.into_sorted(), &clauses)?;
        let atoms = collect_atoms(&constraints, &evidence, query);

        let mrf = GroundMrf::new(
            atoms,
            constraints,
            dependencies,
            clauses,
            evidence,
            query.to_vec(),
            stats,
        );
        tracing::info!(
            atoms = mrf.atoms().len(),
            constraints = mrf.constraints().len(),
            satisfied = stats.satisfied,
            skipped = stats.skipped,
            violated = stats.violated,
            "grounded network"
        );
        Ok(mrf)
    }

    fn install<T: Send>(&self, f: impl FnOnce() -> T + Send) -> Result<T, GroundingError> {
        match self.config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map(|pool| pool.install(f))
                .map_err(|e| GroundingError::ThreadPool {
                    message: e.to_string(),
                }),
            None => Ok(f()),
        }
    }
}

/// Ground with the default engine.
///
/// The constant domains are the ones the evidence's identity encoder was built
/// from.
pub fn ground_network(
    clauses: impl Into<Arc<Vec<WeightedClause>>>,
    evidence: Arc<Evidence>,
    query: &[AtomSignature],
) -> MlnResult<GroundMrf> {
    GroundingEngine::default().ground(clauses, evidence, query)
}

fn check_clauses(clauses: &[WeightedClause]) -> Result<(), GroundingError> {
    let mut seen = BTreeSet::new();
    for clause in clauses {
        if !seen.insert(clause.index) {
            return Err(GroundingError::MalformedClause {
                clause: clause.index,
                message: "clause index used by more than one clause".into(),
            });
        }
        if let Some(w) = clause.weight.soft_value().filter(|w| !w.is_finite()) {
            return Err(GroundingError::MalformedClause {
                clause: clause.index,
                message: format!("soft weight {w} is not finite"),
            });
        }
    }
    Ok(())
}

fn ground_chunk(
    compiled: &CompiledClause<'_>,
    chunk: &Chunk,
    cache: &ConstraintCache,
    abort: &AtomicBool,
) -> Result<GroundingStats, GroundingError> {
    let mut stats = GroundingStats::default();
    if abort.load(Ordering::Relaxed) {
        return Ok(stats);
    }
    let clause = compiled.clause;
    let mut binding = compiled.binding_at(chunk.start);
    for n in chunk.start..chunk.end {
        if n > chunk.start {
            compiled.advance(&mut binding);
        }
        stats.substitutions += 1;
        match compiled.ground(&binding) {
            Outcome::Satisfied => stats.satisfied += 1,
            Outcome::Skipped => stats.skipped += 1,
            Outcome::Clause(literals) if literals.is_empty() => {
                if clause.is_hard() {
                    abort.store(true, Ordering::Relaxed);
                    return Err(GroundingError::HardClauseViolated {
                        clause: clause.index,
                        substitution: compiled.describe(&binding),
                    });
                }
                stats.violated += 1;
                cache.insert(literals, clause.index, true);
            }
            Outcome::Clause(mut literals) => {
                stats.produced += 1;
                // Unit clauses are stored over the positive literal.
                let positive = !(literals.len() == 1 && !literals[0].is_positive());
                if !positive {
                    literals[0] = literals[0].negate();
                }
                cache.insert(literals, clause.index, positive);
            }
        }
    }
    Ok(stats)
}

/// Assign dense constraint ids and aggregate weights.
fn finalise(
    entries: Vec<Entry>,
    clauses: &[WeightedClause],
) -> Result<(Vec<Constraint>, DependencyMap), GroundingError> {
    let weights: std::collections::HashMap<usize, Weight> =
        clauses.iter().map(|c| (c.index, c.weight)).collect();
    let weight_of = |clause: usize| weights.get(&clause).copied().unwrap_or(Weight::Soft(0.0));

    let mut constraints = Vec::with_capacity(entries.len());
    let mut dependencies = Vec::with_capacity(entries.len());
    for (literals, tallies) in entries {
        let hard: Vec<(usize, bool, bool)> = tallies
            .iter()
            .filter(|(clause, _)| weight_of(**clause).is_hard())
            .map(|(&clause, t)| (clause, t.plus > 0, t.minus > 0))
            .collect();
        if hard.iter().any(|h| h.1) && hard.iter().any(|h| h.2) {
            return Err(GroundingError::ConflictingHardConstraints {
                atom: literals.first().map(|l| l.atom().get()).unwrap_or(0),
                clauses: hard.iter().map(|h| h.0).collect(),
            });
        }

        let deps: Vec<ClauseDependency> = tallies
            .iter()
            .filter(|(_, t)| t.frequency() != 0)
            .map(|(&clause, t)| ClauseDependency {
                clause,
                frequency: t.frequency(),
            })
            .collect();
        if deps.is_empty() {
            continue;
        }
        let weight = constraint_weight(&deps, weight_of);
        constraints.push(Constraint::new(constraints.len(), literals, weight));
        dependencies.push(deps);
    }
    Ok((constraints, DependencyMap::new(dependencies)))
}

/// Atoms mentioned by a constraint plus the unknown query atoms.
fn collect_atoms(
    constraints: &[Constraint],
    evidence: &Evidence,
    query: &[AtomSignature],
) -> Vec<GroundAtom> {
    let mut ids = BTreeSet::new();
    for constraint in constraints {
        ids.extend(constraint.literals().iter().map(|l| l.atom()));
    }
    for signature in query {
        if let Ok(db) = evidence.db(signature) {
            ids.extend(db.unknown_ids());
        }
    }
    ids.into_iter().map(GroundAtom::new).collect()
}
