//! Local-search state shared by MC-SAT and MaxWalkSAT.
//!
//! [`SolverGraph`] is a dense, read-only view of the MRF (atoms by slot,
//! per-atom occurrence lists). [`SearchState`] holds one chain's truth
//! assignment, satisfied-literal counts and the list of active constraints
//! that are currently not in their preferred state; a flip updates all of
//! them in time proportional to the atom's occurrences.

use rand::Rng;

use crate::mrf::{Cost, GroundMrf};

/// Marker for "not in the unsatisfied list".
const ABSENT: usize = usize::MAX;

/// A ground constraint over atom slots.
#[derive(Debug, Clone)]
pub(crate) struct GraphConstraint {
    /// `(atom slot, positive)` pairs.
    pub literals: Vec<(usize, bool)>,
    pub weight: f64,
}

impl GraphConstraint {
    pub fn is_hard(&self) -> bool {
        self.weight.is_infinite()
    }

    /// Preferred state: satisfied for `w >= 0`, unsatisfied for `w < 0`.
    pub fn is_good(&self, nsat: u32) -> bool {
        if self.weight >= 0.0 { nsat > 0 } else { nsat == 0 }
    }

    /// Whether local search can ever change this constraint.
    pub fn is_searchable(&self) -> bool {
        !self.literals.is_empty() && self.weight != 0.0
    }
}

/// Dense view of a ground MRF.
#[derive(Debug, Clone)]
pub(crate) struct SolverGraph {
    pub constraints: Vec<GraphConstraint>,
    /// Per atom slot: `(constraint, literal is positive)`.
    pub occurrences: Vec<Vec<(usize, bool)>>,
    /// Cost of a violated hard constraint in weighted search.
    pub hard_penalty: f64,
}

impl SolverGraph {
    pub fn build(mrf: &GroundMrf) -> Self {
        let mut occurrences = vec![Vec::new(); mrf.atoms().len()];
        let mut soft_total = 0.0;
        let constraints = mrf
            .constraints()
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let literals: Vec<(usize, bool)> = c
                    .literals()
                    .iter()
                    .filter_map(|l| mrf.slot(l.atom()).map(|slot| (slot, l.is_positive())))
                    .collect();
                for &(slot, positive) in &literals {
                    occurrences[slot].push((idx, positive));
                }
                if !c.is_hard() {
                    soft_total += c.weight().abs();
                }
                GraphConstraint {
                    literals,
                    weight: c.weight(),
                }
            })
            .collect();
        Self {
            constraints,
            occurrences,
            hard_penalty: soft_total + 1.0,
        }
    }

    pub fn atoms(&self) -> usize {
        self.occurrences.len()
    }

    /// Cost of `truth` over every constraint.
    pub fn cost_of(&self, truth: &[bool]) -> Cost {
        let mut cost = Cost::default();
        for c in &self.constraints {
            if c.weight == 0.0 {
                continue;
            }
            let nsat = c.literals.iter().filter(|&&(a, pos)| truth[a] == pos).count() as u32;
            if c.is_good(nsat) {
                continue;
            }
            if c.is_hard() {
                cost.hard += 1;
            } else {
                cost.soft += c.weight.abs();
            }
        }
        cost
    }
}

/// How the search weighs a bad constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Measure {
    /// Every active constraint counts 1 (SampleSAT: satisfy the active set).
    Count,
    /// `|w|`, hard constraints count `hard_penalty` (MaxWalkSAT).
    Weighted,
}

/// One chain's assignment and bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct SearchState<'g> {
    graph: &'g SolverGraph,
    measure: Measure,
    truth: Vec<bool>,
    fixed: Vec<Option<bool>>,
    nsat: Vec<u32>,
    active: Vec<bool>,
    unsat: Vec<usize>,
    unsat_pos: Vec<usize>,
    bad_hard: usize,
    bad_soft: f64,
}

impl<'g> SearchState<'g> {
    pub fn new(graph: &'g SolverGraph, truth: Vec<bool>, measure: Measure) -> Self {
        let nsat = graph
            .constraints
            .iter()
            .map(|c| c.literals.iter().filter(|&&(a, pos)| truth[a] == pos).count() as u32)
            .collect();
        let n = graph.constraints.len();
        Self {
            graph,
            measure,
            truth,
            fixed: vec![None; graph.atoms()],
            nsat,
            active: vec![false; n],
            unsat: Vec::new(),
            unsat_pos: vec![ABSENT; n],
            bad_hard: 0,
            bad_soft: 0.0,
        }
    }

    /// Random (`random = true`) or all-false assignment.
    pub fn initial_truth(graph: &SolverGraph, random: bool, rng: &mut impl Rng) -> Vec<bool> {
        (0..graph.atoms())
            .map(|_| random && rng.gen_bool(0.5))
            .collect()
    }

    pub fn truth(&self) -> &[bool] {
        &self.truth
    }

    pub fn is_good(&self, c: usize) -> bool {
        self.graph.constraints[c].is_good(self.nsat[c])
    }

    /// Choose the active constraints. The callback sees the constraint index,
    /// the constraint, and whether it is currently good.
    pub fn set_active(&mut self, mut select: impl FnMut(usize, &GraphConstraint, bool) -> bool) {
        for &c in &self.unsat {
            self.unsat_pos[c] = ABSENT;
        }
        self.unsat.clear();
        self.bad_hard = 0;
        self.bad_soft = 0.0;
        let graph = self.graph;
        for (c, constraint) in graph.constraints.iter().enumerate() {
            let good = constraint.is_good(self.nsat[c]);
            self.active[c] = constraint.is_searchable() && select(c, constraint, good);
            if self.active[c] && !good {
                self.push_unsat(c);
            }
        }
    }

    pub fn is_active(&self, c: usize) -> bool {
        self.active[c]
    }

    /// Number of active constraints not in their preferred state.
    pub fn unsat_len(&self) -> usize {
        self.unsat.len()
    }

    /// Cost of the bad active constraints.
    pub fn active_cost(&self) -> Cost {
        Cost {
            hard: self.bad_hard,
            soft: self.bad_soft.max(0.0),
        }
    }

    pub fn clear_fixed(&mut self) {
        self.fixed.iter_mut().for_each(|f| *f = None);
    }

    /// Pin an atom to a value for the rest of the round.
    pub fn fix(&mut self, atom: usize, value: bool) {
        self.fixed[atom] = Some(value);
        if self.truth[atom] != value {
            self.flip(atom);
        }
    }

    /// Flip an atom and update satisfied counts and the unsatisfied list.
    pub fn flip(&mut self, atom: usize) {
        let value = !self.truth[atom];
        self.truth[atom] = value;
        let graph = self.graph;
        for &(c, positive) in &graph.occurrences[atom] {
            if positive == value {
                self.nsat[c] += 1;
            } else {
                self.nsat[c] -= 1;
            }
            if !self.active[c] {
                continue;
            }
            let good = graph.constraints[c].is_good(self.nsat[c]);
            let listed = self.unsat_pos[c] != ABSENT;
            if good && listed {
                self.remove_unsat(c);
            } else if !good && !listed {
                self.push_unsat(c);
            }
        }
    }

    /// Change of the bad measure over active constraints if `atom` flipped.
    /// Negative values are improvements.
    pub fn delta(&self, atom: usize) -> f64 {
        let value = self.truth[atom];
        let mut delta = 0.0;
        for &(c, positive) in &self.graph.occurrences[atom] {
            if !self.active[c] {
                continue;
            }
            let constraint = &self.graph.constraints[c];
            let nsat = self.nsat[c];
            let after = if positive == value { nsat - 1 } else { nsat + 1 };
            match (constraint.is_good(nsat), constraint.is_good(after)) {
                (true, false) => delta += self.weight_of(c),
                (false, true) => delta -= self.weight_of(c),
                _ => {}
            }
        }
        delta
    }

    /// One WalkSAT move: pick a bad active constraint and flip one of its
    /// atoms, greedily with probability `probability_best`. Returns `false`
    /// when no move was possible.
    pub fn walk_step(&mut self, rng: &mut impl Rng, probability_best: f64) -> bool {
        if self.unsat.is_empty() {
            return false;
        }
        let c = self.unsat[rng.gen_range(0..self.unsat.len())];
        let constraint = &self.graph.constraints[c];
        // A negative constraint becomes good by falsifying its true literals.
        let candidates: Vec<usize> = constraint
            .literals
            .iter()
            .filter(|&&(a, pos)| self.fixed[a].is_none() && (constraint.weight >= 0.0 || self.truth[a] == pos))
            .map(|&(a, _)| a)
            .collect();
        if candidates.is_empty() {
            return false;
        }
        let atom = if rng.gen_bool(probability_best) {
            let mut best = candidates[0];
            let mut best_delta = f64::INFINITY;
            for &a in &candidates {
                let d = self.delta(a);
                if d < best_delta {
                    best = a;
                    best_delta = d;
                }
            }
            best
        } else {
            candidates[rng.gen_range(0..candidates.len())]
        };
        self.flip(atom);
        true
    }

    /// One simulated-annealing move on a random free atom.
    ///
    /// A move that leaves the measure unchanged is taken with probability
    /// 1/2, so a run of moves reaches every assignment of the unconstrained
    /// atoms instead of preserving their parity.
    pub fn anneal_step(&mut self, rng: &mut impl Rng, temperature: f64) -> bool {
        let n = self.truth.len();
        if n == 0 {
            return false;
        }
        let atom = rng.gen_range(0..n);
        if self.fixed[atom].is_some() {
            return false;
        }
        let delta = self.delta(atom);
        let accept = if delta < 0.0 {
            true
        } else if delta == 0.0 {
            rng.gen_bool(0.5)
        } else {
            rng.gen_bool((-delta / temperature).exp().clamp(0.0, 1.0))
        };
        if accept {
            self.flip(atom);
        }
        accept
    }

    /// Cost of the current assignment over every constraint.
    pub fn full_cost(&self) -> Cost {
        self.graph.cost_of(&self.truth)
    }

    fn weight_of(&self, c: usize) -> f64 {
        let constraint = &self.graph.constraints[c];
        match self.measure {
            Measure::Count => 1.0,
            Measure::Weighted if constraint.is_hard() => self.graph.hard_penalty,
            Measure::Weighted => constraint.weight.abs(),
        }
    }

    fn push_unsat(&mut self, c: usize) {
        self.unsat_pos[c] = self.unsat.len();
        self.unsat.push(c);
        let constraint = &self.graph.constraints[c];
        if constraint.is_hard() {
            self.bad_hard += 1;
        } else {
            self.bad_soft += constraint.weight.abs();
        }
    }

    fn remove_unsat(&mut self, c: usize) {
        let pos = self.unsat_pos[c];
        self.unsat.swap_remove(pos);
        if let Some(&moved) = self.unsat.get(pos) {
            self.unsat_pos[moved] = pos;
        }
        self.unsat_pos[c] = ABSENT;
        let constraint = &self.graph.constraints[c];
        if constraint.is_hard() {
            self.bad_hard -= 1;
        } else {
            self.bad_soft -= constraint.weight.abs();
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    /// a ∨ b (1.0), ¬a (hard), b ∨ c (−0.5) over atoms 0, 1, 2.
    fn graph() -> SolverGraph {
        let constraints = vec![
            GraphConstraint {
                literals: vec![(0, true), (1, true)],
                weight: 1.0,
            },
            GraphConstraint {
                literals: vec![(0, false)],
                weight: f64::INFINITY,
            },
            GraphConstraint {
                literals: vec![(1, true), (2, true)],
                weight: -0.5,
            },
        ];
        let mut occurrences = vec![Vec::new(); 3];
        for (c, constraint) in constraints.iter().enumerate() {
            for &(a, pos) in &constraint.literals {
                occurrences[a].push((c, pos));
            }
        }
        SolverGraph {
            constraints,
            occurrences,
            hard_penalty: 2.5,
        }
    }

    #[test]
    fn flips_maintain_unsat_list() {
        let g = graph();
        let mut state = SearchState::new(&g, vec![true, false, false], Measure::Weighted);
        state.set_active(|_, _, _| true);
        // a ∨ b satisfied, ¬a violated, b ∨ c unsatisfied (good: negative weight).
        assert_eq!(state.unsat_len(), 1);
        assert_eq!(state.active_cost(), Cost { hard: 1, soft: 0.0 });

        state.flip(0);
        // a ∨ b now violated.
        assert_eq!(state.unsat_len(), 1);
        assert_eq!(state.active_cost(), Cost { hard: 0, soft: 1.0 });

        state.flip(1);
        // b satisfies a ∨ b but also b ∨ c, which prefers to be false.
        assert_eq!(state.unsat_len(), 1);
        assert!((state.active_cost().soft - 0.5).abs() < 1e-12);
        assert_eq!(state.full_cost(), state.active_cost());
    }

    #[test]
    fn delta_matches_actual_change() {
        let g = graph();
        let mut state = SearchState::new(&g, vec![false, false, true], Measure::Weighted);
        state.set_active(|_, _, _| true);
        for atom in 0..3 {
            let before = state.active_cost();
            let predicted = state.delta(atom);
            state.flip(atom);
            let after = state.active_cost();
            let actual = (after.hard as f64 - before.hard as f64) * g.hard_penalty
                + (after.soft - before.soft);
            assert!((predicted - actual).abs() < 1e-9, "atom {atom}");
            state.flip(atom);
        }
    }

    #[test]
    fn walksat_satisfies_the_active_set() {
        let g = graph();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = SearchState::new(&g, vec![true, false, true], Measure::Count);
        state.set_active(|_, c, _| c.is_hard() || c.weight > 0.0);
        for _ in 0..100 {
            if state.unsat_len() == 0 {
                break;
            }
            state.walk_step(&mut rng, 0.5);
        }
        assert_eq!(state.unsat_len(), 0);
        assert!(!state.truth()[0]);
        assert!(state.truth()[1]);
    }

    #[test]
    fn annealing_reaches_every_assignment_of_free_atoms() {
        // No constraints: every move is neutral.
        let g = SolverGraph {
            constraints: Vec::new(),
            occurrences: vec![Vec::new(); 2],
            hard_penalty: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = SearchState::new(&g, vec![false, false], Measure::Count);
        state.set_active(|_, _, _| true);
        let mut seen = [0usize; 4];
        for _ in 0..4000 {
            // Two moves per round, as many as there are atoms.
            state.anneal_step(&mut rng, 0.1);
            state.anneal_step(&mut rng, 0.1);
            let t = state.truth();
            seen[(t[0] as usize) | ((t[1] as usize) << 1)] += 1;
        }
        for (assignment, &count) in seen.iter().enumerate() {
            assert!((700..1300).contains(&count), "{assignment:02b} seen {count} times");
        }
    }

    #[test]
    fn fixed_atoms_are_never_flipped_by_search() {
        let g = graph();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = SearchState::new(&g, vec![false, false, false], Measure::Count);
        state.set_active(|c, _, _| c == 0);
        state.fix(1, false);
        state.fix(0, false);
        for _ in 0..20 {
            assert!(!state.walk_step(&mut rng, 1.0));
        }
        assert_eq!(state.unsat_len(), 1);
    }
}
