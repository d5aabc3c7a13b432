//! Evidence store: tri-state truth values of ground atoms.
//!
//! Evidence follows per-signature reasoning assumptions:
//!
//! - **Closed World Assumption (CWA)**: an atom without an explicit assertion is false
//! - **Open World Assumption (OWA)**: an atom without an explicit assertion is unknown
//!
//! Only explicit assertions are materialised; the defaults are answered on
//! lookup, so memory scales with the evidence file, not with the domains.
//! Query signatures are always open-world.

mod builder;
mod db;
mod function;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::error::{EvidenceError, IdentityError};
use crate::identity::IdentityEncoder;
use crate::logic::AtomSignature;

pub use builder::EvidenceBuilder;
pub use db::AtomEvidenceDb;
pub use function::FunctionMapper;

/// Result type for evidence operations.
pub type EvidenceResult<T> = std::result::Result<T, EvidenceError>;

/// Truth value of a ground atom according to the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    True,
    False,
    Unknown,
}

impl TriState {
    pub fn from_bool(value: bool) -> Self {
        if value { TriState::True } else { TriState::False }
    }

    /// `Some(truth)` when the evidence decides the atom.
    pub fn known(self) -> Option<bool> {
        match self {
            TriState::True => Some(true),
            TriState::False => Some(false),
            TriState::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == TriState::Unknown
    }
}

impl std::fmt::Display for TriState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriState::True => write!(f, "True"),
            TriState::False => write!(f, "False"),
            TriState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Evidence over every signature of a theory.
#[derive(Debug, Clone)]
pub struct Evidence {
    encoder: Arc<IdentityEncoder>,
    /// One table per identity block, aligned with `encoder.identities()`.
    dbs: Vec<AtomEvidenceDb>,
    functions: Vec<FunctionMapper>,
}

impl Evidence {
    pub(crate) fn from_parts(
        encoder: Arc<IdentityEncoder>,
        dbs: Vec<AtomEvidenceDb>,
        functions: Vec<FunctionMapper>,
    ) -> Self {
        Self {
            encoder,
            dbs,
            functions,
        }
    }

    /// The id layout this evidence is expressed in.
    pub fn encoder(&self) -> &IdentityEncoder {
        &self.encoder
    }

    /// Shared handle to the encoder.
    pub fn encoder_arc(&self) -> Arc<IdentityEncoder> {
        Arc::clone(&self.encoder)
    }

    /// Evidence table of a signature.
    pub fn db(&self, signature: &AtomSignature) -> EvidenceResult<&AtomEvidenceDb> {
        let pos = self.position(signature)?;
        Ok(&self.dbs[pos])
    }

    /// All evidence tables in layout order.
    pub fn dbs(&self) -> &[AtomEvidenceDb] {
        &self.dbs
    }

    /// Truth value of `id`, which must belong to `signature`.
    pub fn get(&self, signature: &AtomSignature, id: AtomId) -> EvidenceResult<TriState> {
        let db = self.db(signature)?;
        if !db.identity().contains(id) {
            return Err(out_of_range(db, id).into());
        }
        Ok(db.get(id))
    }

    /// Truth value of any ground atom.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of the layout.
    pub fn state(&self, id: AtomId) -> TriState {
        let raw = id.get();
        let pos = self.dbs.partition_point(|db| db.identity().end() <= raw);
        match self.dbs.get(pos) {
            Some(db) if db.identity().contains(id) => db.get(id),
            _ => panic!("{id} is outside the ground atom layout"),
        }
    }

    pub fn set_true(&mut self, signature: &AtomSignature, id: AtomId) -> EvidenceResult<()> {
        self.set(signature, id, TriState::True)
    }

    pub fn set_false(&mut self, signature: &AtomSignature, id: AtomId) -> EvidenceResult<()> {
        self.set(signature, id, TriState::False)
    }

    pub fn set_unknown(&mut self, signature: &AtomSignature, id: AtomId) -> EvidenceResult<()> {
        self.set(signature, id, TriState::Unknown)
    }

    /// Explicitly assert a truth value; it overrides the CWA/OWA default.
    pub fn set(
        &mut self,
        signature: &AtomSignature,
        id: AtomId,
        state: TriState,
    ) -> EvidenceResult<()> {
        let pos = self.position(signature)?;
        let db = &mut self.dbs[pos];
        if !db.identity().contains(id) {
            return Err(out_of_range(db, id).into());
        }
        db.set(id, state);
        Ok(())
    }

    /// Assert a ground atom given by its constants.
    pub fn assert_atom<S: AsRef<str>>(
        &mut self,
        signature: &AtomSignature,
        constants: &[S],
        state: TriState,
    ) -> EvidenceResult<AtomId> {
        let id = self.encoder.encode(signature, constants)?;
        self.set(signature, id, state)?;
        Ok(id)
    }

    /// Record `function(args) = value`.
    ///
    /// The mapping is stored both in the function's forward mapper and as a
    /// true atom of its auxiliary predicate (return value first).
    pub fn add_function_mapping<S: AsRef<str>>(
        &mut self,
        function: &str,
        value: &str,
        args: &[S],
    ) -> EvidenceResult<()> {
        let pos = self
            .functions
            .iter()
            .position(|f| f.symbol() == function && f.arity() == args.len())
            .ok_or_else(|| EvidenceError::UnknownFunction {
                function: format!("{function}/{}", args.len()),
            })?;
        let mapper = &mut self.functions[pos];
        mapper.insert(&self.encoder, value, args)?;

        let aux = mapper.auxiliary().clone();
        let mut constants: Vec<&str> = Vec::with_capacity(args.len() + 1);
        constants.push(value);
        constants.extend(args.iter().map(AsRef::as_ref));
        self.assert_atom(&aux, &constants, TriState::True)?;
        Ok(())
    }

    /// Forward mapper of a function.
    pub fn function(&self, symbol: &str, arity: usize) -> Option<&FunctionMapper> {
        self.functions
            .iter()
            .find(|f| f.symbol() == symbol && f.arity() == arity)
    }

    /// Whether `signature` is open-world (query or hidden predicate).
    pub fn is_open_world(&self, signature: &AtomSignature) -> EvidenceResult<bool> {
        Ok(!self.db(signature)?.is_closed_world())
    }

    fn position(&self, signature: &AtomSignature) -> EvidenceResult<usize> {
        self.dbs
            .iter()
            .position(|db| db.identity().signature() == signature)
            .ok_or_else(|| EvidenceError::UnknownSignature {
                signature: signature.to_string(),
            })
    }
}

fn out_of_range(db: &AtomEvidenceDb, id: AtomId) -> IdentityError {
    IdentityError::OutOfRange {
        signature: db.identity().signature().to_string(),
        id: id.get(),
        start: db.identity().start(),
        end: db.identity().end(),
    }
}
