//! Ground atom identifiers and signed ground literals.
//!
//! Every ground atom is identified by an [`AtomId`] handed out by the
//! [`crate::identity::IdentityEncoder`]. Ids start at 1 so that a ground literal
//! can be stored as a single signed integer: `+id` is satisfied when the atom is
//! true, `-id` when it is false.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Unique, niche-optimized identifier for a ground atom.
///
/// Uses `NonZeroU32` so that `Option<AtomId>` is the same size as `AtomId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AtomId(NonZeroU32);

impl AtomId {
    /// Largest id that still fits in a signed literal.
    pub const MAX: u32 = i32::MAX as u32;

    /// Create an `AtomId` from a raw `u32`.
    ///
    /// Returns `None` if `raw` is zero or does not fit in a signed literal.
    pub fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX {
            return None;
        }
        NonZeroU32::new(raw).map(AtomId)
    }

    /// Get the underlying `u32` value.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The positive literal over this atom.
    pub fn positive(self) -> GroundLiteral {
        GroundLiteral(self.get() as i32)
    }

    /// The negative literal over this atom.
    pub fn negative(self) -> GroundLiteral {
        GroundLiteral(-(self.get() as i32))
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

/// A signed reference to a ground atom inside a ground constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GroundLiteral(i32);

impl GroundLiteral {
    /// Build a literal from an atom and a polarity.
    pub fn new(atom: AtomId, positive: bool) -> Self {
        if positive {
            atom.positive()
        } else {
            atom.negative()
        }
    }

    /// The atom this literal refers to.
    pub fn atom(self) -> AtomId {
        // Literals are only ever built from valid ids, so the magnitude is non-zero.
        AtomId(NonZeroU32::new(self.0.unsigned_abs()).unwrap_or(NonZeroU32::MIN))
    }

    /// Whether the literal is satisfied by a true atom.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// The complementary literal.
    pub fn negate(self) -> Self {
        GroundLiteral(-self.0)
    }

    /// Whether the literal is satisfied under the given truth value of its atom.
    pub fn is_satisfied_by(self, truth: bool) -> bool {
        self.is_positive() == truth
    }

    /// Raw signed value (`+id` / `-id`).
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for GroundLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_positive() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "!{}", self.0.unsigned_abs())
        }
    }
}
