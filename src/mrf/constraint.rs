//! Ground constraints and their clause dependencies.

use crate::atom::GroundLiteral;
use crate::logic::Weight;

/// Weight of a hard constraint. Negative hard constraints use `-HARD_WEIGHT`.
pub const HARD_WEIGHT: f64 = f64::INFINITY;

/// A ground clause: a disjunction of ground literals with a real weight.
///
/// A positive weight rewards worlds satisfying the clause, a negative weight
/// rewards worlds violating it. Hard constraints carry an infinite weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    id: usize,
    literals: Vec<GroundLiteral>,
    weight: f64,
}

impl Constraint {
    pub(crate) fn new(id: usize, literals: Vec<GroundLiteral>, weight: f64) -> Self {
        Self {
            id,
            literals,
            weight,
        }
    }

    /// Dense constraint id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Literals, sorted by atom id.
    pub fn literals(&self) -> &[GroundLiteral] {
        &self.literals
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn is_hard(&self) -> bool {
        self.weight.is_infinite()
    }

    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }

    /// A soft clause contradicted by the evidence. It never changes truth.
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Whether the constraint is in its preferred state given the number of
    /// satisfied literals.
    pub fn is_good(&self, n_satisfied: usize) -> bool {
        if self.weight >= 0.0 {
            n_satisfied > 0
        } else {
            n_satisfied == 0
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.weight)?;
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " v ")?;
            }
            write!(f, "{lit}")?;
        }
        Ok(())
    }
}

/// One contributing clause of a constraint.
///
/// The frequency counts how many substitutions of the clause produced the
/// constraint; it is negative when the constraint is stored with the
/// opposite sign (a negated unit clause `!a` is stored as `a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseDependency {
    pub clause: usize,
    pub frequency: i32,
}

/// For each constraint, its contributing clauses sorted by clause index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: Vec<Vec<ClauseDependency>>,
}

impl DependencyMap {
    pub(crate) fn new(entries: Vec<Vec<ClauseDependency>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contributions of constraint `idx`.
    pub fn get(&self, idx: usize) -> &[ClauseDependency] {
        &self.entries[idx]
    }

    /// Combine the contributions of constraint `idx` into a single weight.
    ///
    /// Any hard contribution makes the constraint hard; its sign follows the
    /// summed hard frequencies. Soft contributions add up as `freq * w`.
    pub fn aggregate(&self, idx: usize, weight_of: impl Fn(usize) -> Weight) -> f64 {
        constraint_weight(self.get(idx), weight_of)
    }
}

pub(crate) fn constraint_weight(deps: &[ClauseDependency], weight_of: impl Fn(usize) -> Weight) -> f64 {
    let mut hard: i64 = 0;
    let mut soft = 0.0;
    for dep in deps {
        match weight_of(dep.clause) {
            Weight::Hard => hard += i64::from(dep.frequency),
            Weight::Soft(w) => soft += f64::from(dep.frequency) * w,
        }
    }
    match hard.signum() {
        1 => HARD_WEIGHT,
        -1 => -HARD_WEIGHT,
        _ => soft,
    }
}
