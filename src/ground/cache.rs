//! Concurrent deduplication of ground clauses.
//!
//! Ground clauses produced by different clauses (or by different substitutions
//! of the same clause) that share a literal set are merged into one entry that
//! remembers every contributing clause.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::atom::GroundLiteral;

/// Per-clause contribution counts for one literal set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Tally {
    /// Substitutions that produced the literal set as is.
    pub plus: u32,
    /// Substitutions that produced its negation (negated unit clauses).
    pub minus: u32,
}

impl Tally {
    pub fn frequency(&self) -> i32 {
        self.plus as i32 - self.minus as i32
    }
}

/// Literal set → contributions, keyed by clause index.
pub(super) type Entry = (Vec<GroundLiteral>, BTreeMap<usize, Tally>);

/// Thread-safe ground clause table.
#[derive(Debug, Default)]
pub(super) struct ConstraintCache {
    entries: DashMap<Vec<GroundLiteral>, BTreeMap<usize, Tally>>,
}

impl ConstraintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one substitution of `clause` producing `literals`.
    pub fn insert(&self, literals: Vec<GroundLiteral>, clause: usize, positive: bool) {
        let mut entry = self.entries.entry(literals).or_default();
        let tally = entry.entry(clause).or_default();
        if positive {
            tally.plus += 1;
        } else {
            tally.minus += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drain the table in literal-set order, independent of insertion order.
    pub fn into_sorted(self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.entries.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomId;

    fn lits(ids: &[i32]) -> Vec<GroundLiteral> {
        ids.iter()
            .map(|&i| GroundLiteral::new(AtomId::new(i.unsigned_abs()).unwrap(), i > 0))
            .collect()
    }

    #[test]
    fn duplicates_are_merged() {
        let cache = ConstraintCache::new();
        cache.insert(lits(&[1, -2]), 0, true);
        cache.insert(lits(&[1, -2]), 0, true);
        cache.insert(lits(&[1, -2]), 4, true);
        cache.insert(lits(&[3]), 1, false);
        assert_eq!(cache.len(), 2);

        let sorted = cache.into_sorted();
        let (key, tallies) = &sorted[0];
        assert_eq!(key, &lits(&[1, -2]));
        assert_eq!(tallies[&0].frequency(), 2);
        assert_eq!(tallies[&4].frequency(), 1);
        assert_eq!(sorted[1].1[&1].frequency(), -1);
    }

    #[test]
    fn parallel_inserts_are_counted() {
        use rayon::prelude::*;

        let cache = ConstraintCache::new();
        (0..1000).into_par_iter().for_each(|i| {
            cache.insert(lits(&[1 + (i % 3)]), 0, true);
        });
        let total: i32 = cache
            .into_sorted()
            .iter()
            .map(|(_, t)| t[&0].frequency())
            .sum();
        assert_eq!(total, 1000);
    }
}
