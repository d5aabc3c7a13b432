//! Ground Markov Random Field.
//!
//! The MRF is the weighted constraint graph every inference routine works on.
//! Atoms and constraints live in dense arrays (atoms sorted by id, constraints
//! indexed by their dense id). Inference mutates atom truth states and true
//! counts in place; weight learners rewrite constraint weights through
//! [`GroundMrf::update_weights`]. The structure itself never changes after
//! grounding.

mod constraint;

use std::sync::Arc;

use crate::atom::AtomId;
use crate::evidence::Evidence;
use crate::logic::{AtomSignature, Weight, WeightedClause};

pub use constraint::{ClauseDependency, Constraint, DependencyMap, HARD_WEIGHT};
pub(crate) use constraint::constraint_weight;

/// A boolean random variable of the ground network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundAtom {
    pub id: AtomId,
    /// Current truth value.
    pub state: bool,
    /// Number of collected samples in which the atom was true.
    pub true_count: u64,
}

impl GroundAtom {
    pub fn new(id: AtomId) -> Self {
        Self {
            id,
            state: false,
            true_count: 0,
        }
    }
}

/// Counters collected while grounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroundingStats {
    /// Substitutions enumerated over all clauses.
    pub substitutions: u64,
    /// Ground clauses dropped because the evidence satisfies them.
    pub satisfied: u64,
    /// Substitutions skipped (variable constraints, undefined functions).
    pub skipped: u64,
    /// Soft ground clauses fully contradicted by the evidence.
    pub violated: u64,
    /// Ground clauses that reached the deduplication step.
    pub produced: u64,
}

impl std::ops::AddAssign for GroundingStats {
    fn add_assign(&mut self, rhs: Self) {
        self.substitutions += rhs.substitutions;
        self.satisfied += rhs.satisfied;
        self.skipped += rhs.skipped;
        self.violated += rhs.violated;
        self.produced += rhs.produced;
    }
}

/// Cost of the current assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cost {
    /// Violated hard constraints.
    pub hard: usize,
    /// Sum of `|weight|` over violated soft constraints.
    pub soft: f64,
}

impl Cost {
    /// Lexicographic comparison: hard violations first.
    pub fn is_better_than(&self, other: &Cost) -> bool {
        self.hard < other.hard || (self.hard == other.hard && self.soft < other.soft)
    }
}

/// The ground network produced by [`crate::ground`].
#[derive(Debug, Clone)]
pub struct GroundMrf {
    atoms: Vec<GroundAtom>,
    constraints: Vec<Constraint>,
    dependencies: DependencyMap,
    clauses: Arc<Vec<WeightedClause>>,
    evidence: Arc<Evidence>,
    query: Vec<AtomSignature>,
    samples: u64,
    stats: GroundingStats,
}

impl GroundMrf {
    pub(crate) fn new(
        mut atoms: Vec<GroundAtom>,
        constraints: Vec<Constraint>,
        dependencies: DependencyMap,
        clauses: Arc<Vec<WeightedClause>>,
        evidence: Arc<Evidence>,
        query: Vec<AtomSignature>,
        stats: GroundingStats,
    ) -> Self {
        atoms.sort_unstable_by_key(|a| a.id);
        atoms.dedup_by_key(|a| a.id);
        Self {
            atoms,
            constraints,
            dependencies,
            clauses,
            evidence,
            query,
            samples: 0,
            stats,
        }
    }

    /// All ground atoms, sorted by id.
    pub fn atoms(&self) -> &[GroundAtom] {
        &self.atoms
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [GroundAtom] {
        &mut self.atoms
    }

    /// Dense position of an atom in [`GroundMrf::atoms`].
    pub fn slot(&self, id: AtomId) -> Option<usize> {
        self.atoms.binary_search_by_key(&id, |a| a.id).ok()
    }

    /// Look up an atom.
    pub fn get_atom(&self, id: AtomId) -> Option<&GroundAtom> {
        self.slot(id).map(|s| &self.atoms[s])
    }

    /// Look up an atom that must be part of the network.
    ///
    /// # Panics
    ///
    /// Panics if the atom was not grounded.
    pub fn atom(&self, id: AtomId) -> &GroundAtom {
        match self.get_atom(id) {
            Some(atom) => atom,
            None => panic!("{id} is not part of the ground network"),
        }
    }

    /// Set the truth value of a grounded atom.
    ///
    /// # Panics
    ///
    /// Panics if the atom was not grounded.
    pub fn set_state(&mut self, id: AtomId, state: bool) {
        match self.slot(id) {
            Some(slot) => self.atoms[slot].state = state,
            None => panic!("{id} is not part of the ground network"),
        }
    }

    /// All constraints, indexed by constraint id.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The constraint with the given id.
    pub fn constraint(&self, idx: usize) -> &Constraint {
        &self.constraints[idx]
    }

    /// The full dependency map.
    pub fn dependency_map(&self) -> &DependencyMap {
        &self.dependencies
    }

    /// Contributing clauses (and frequencies) of a constraint.
    pub fn dependencies(&self, idx: usize) -> &[ClauseDependency] {
        self.dependencies.get(idx)
    }

    /// The first-order clauses the network was grounded from.
    pub fn clauses(&self) -> &[WeightedClause] {
        &self.clauses
    }

    /// The evidence the network was grounded against.
    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Query signatures.
    pub fn query(&self) -> &[AtomSignature] {
        &self.query
    }

    /// Grounding counters.
    pub fn stats(&self) -> GroundingStats {
        self.stats
    }

    /// Number of literals of constraint `idx` satisfied by the current states.
    pub fn n_satisfied_literals(&self, idx: usize) -> usize {
        self.constraints[idx]
            .literals()
            .iter()
            .filter(|lit| lit.is_satisfied_by(self.atom(lit.atom()).state))
            .count()
    }

    /// Whether constraint `idx` is in its preferred state: satisfied for
    /// positive weights, unsatisfied for negative weights.
    pub fn is_satisfied(&self, idx: usize) -> bool {
        let constraint = &self.constraints[idx];
        constraint.is_good(self.n_satisfied_literals(idx))
    }

    /// Cost of the current assignment.
    pub fn cost(&self) -> Cost {
        let mut cost = Cost::default();
        for (idx, constraint) in self.constraints.iter().enumerate() {
            if constraint.weight() == 0.0 || self.is_satisfied(idx) {
                continue;
            }
            if constraint.is_hard() {
                cost.hard += 1;
            } else {
                cost.soft += constraint.weight().abs();
            }
        }
        cost
    }

    /// Recompute every constraint weight from new clause weights, keyed by
    /// clause index. The ground structure is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if a constraint depends on a clause `weight_of` does not know.
    pub fn update_weights(&mut self, weight_of: impl Fn(usize) -> Option<Weight>) {
        for (idx, constraint) in self.constraints.iter_mut().enumerate() {
            let weight = self.dependencies.aggregate(idx, |clause| match weight_of(clause) {
                Some(w) => w,
                None => panic!("no weight for clause #{clause} (constraint {idx})"),
            });
            constraint.set_weight(weight);
        }
    }

    /// Reset constraint weights to the weights of the stored clauses.
    pub fn reset_weights(&mut self) {
        let clauses = Arc::clone(&self.clauses);
        self.update_weights(|index| {
            clauses
                .iter()
                .find(|c| c.index == index)
                .map(|c| c.weight)
        });
    }

    /// Number of samples behind the true counts.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub(crate) fn record_samples(&mut self, counts: &[u64], samples: u64) {
        for (atom, &count) in self.atoms.iter_mut().zip(counts) {
            atom.true_count = count;
        }
        self.samples = samples;
    }

    /// Estimated marginal probability of an atom: `true_count / samples`.
    /// Zero when no sample has been collected.
    pub fn marginal(&self, id: AtomId) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.atom(id).true_count as f64 / self.samples as f64
    }

    /// Atoms whose signature is a query signature.
    pub fn query_atoms(&self) -> impl Iterator<Item = &GroundAtom> + '_ {
        let encoder = self.evidence.encoder();
        let blocks: Vec<_> = self
            .query
            .iter()
            .filter_map(|sig| encoder.identity(sig).ok())
            .collect();
        self.atoms
            .iter()
            .filter(move |a| blocks.iter().any(|b| b.contains(a.id)))
    }

    /// Clear all truth counts and states.
    pub fn reset_states(&mut self) {
        for atom in &mut self.atoms {
            atom.state = false;
            atom.true_count = 0;
        }
        self.samples = 0;
    }
}

impl std::fmt::Display for GroundMrf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hard = self.constraints.iter().filter(|c| c.is_hard()).count();
        write!(
            f,
            "ground MRF: {} atoms, {} constraints ({} hard, {} soft)",
            self.atoms.len(),
            self.constraints.len(),
            hard,
            self.constraints.len() - hard
        )
    }
}
