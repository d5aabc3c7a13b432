//! Sparse per-signature evidence table.

use std::collections::HashMap;

use crate::atom::AtomId;
use crate::identity::AtomIdentity;

use super::TriState;

/// Evidence for the ground atoms of one signature.
///
/// Only explicit assertions are stored; everything else answers with the
/// signature's default (`False` under CWA, `Unknown` under OWA).
#[derive(Debug, Clone)]
pub struct AtomEvidenceDb {
    identity: AtomIdentity,
    closed_world: bool,
    explicit: HashMap<AtomId, TriState>,
}

impl AtomEvidenceDb {
    pub fn new(identity: AtomIdentity, closed_world: bool) -> Self {
        Self {
            identity,
            closed_world,
            explicit: HashMap::new(),
        }
    }

    pub fn identity(&self) -> &AtomIdentity {
        &self.identity
    }

    pub fn is_closed_world(&self) -> bool {
        self.closed_world
    }

    /// Value returned for atoms without an explicit assertion.
    pub fn default_state(&self) -> TriState {
        if self.closed_world {
            TriState::False
        } else {
            TriState::Unknown
        }
    }

    /// Truth value of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this signature.
    pub fn get(&self, id: AtomId) -> TriState {
        assert!(
            self.identity.contains(id),
            "{id} does not belong to {}",
            self.identity.signature()
        );
        self.explicit
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.default_state())
    }

    pub(crate) fn set(&mut self, id: AtomId, state: TriState) {
        self.explicit.insert(id, state);
    }

    /// Number of explicit assertions.
    pub fn explicit_len(&self) -> usize {
        self.explicit.len()
    }

    /// Ids explicitly asserted with the given state, in ascending order.
    pub fn ids_with(&self, state: TriState) -> Vec<AtomId> {
        let mut ids: Vec<AtomId> = self
            .explicit
            .iter()
            .filter(|&(_, &s)| s == state)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids whose truth value is unknown (explicitly or by default), ascending.
    pub fn unknown_ids(&self) -> Vec<AtomId> {
        if self.closed_world {
            return self.ids_with(TriState::Unknown);
        }
        self.identity
            .ids()
            .filter(|id| self.get(*id).is_unknown())
            .collect()
    }

    /// Counts of (true, false, unknown) atoms over the whole block.
    pub fn counts(&self) -> (u32, u32, u32) {
        let mut known = [0u32; 3];
        for state in self.explicit.values() {
            match state {
                TriState::True => known[0] += 1,
                TriState::False => known[1] += 1,
                TriState::Unknown => known[2] += 1,
            }
        }
        let implicit = self.identity.len() - self.explicit.len() as u32;
        match self.default_state() {
            TriState::False => (known[0], known[1] + implicit, known[2]),
            _ => (known[0], known[1], known[2] + implicit),
        }
    }
}
