//! Builder assigning reasoning assumptions to signatures.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::MlnResult;
use crate::identity::IdentityEncoder;
use crate::logic::AtomSignature;

use super::{AtomEvidenceDb, Evidence, FunctionMapper, TriState};

/// Builds an [`Evidence`] store.
///
/// Every signature is closed-world unless it is listed as open-world (hidden
/// predicates) or as a query signature. Function auxiliary predicates are
/// always closed-world.
pub struct EvidenceBuilder {
    encoder: Arc<IdentityEncoder>,
    open_world: HashSet<AtomSignature>,
    query: HashSet<AtomSignature>,
    closed_world: HashSet<AtomSignature>,
    facts: Vec<(AtomSignature, Vec<String>, TriState)>,
    mappings: Vec<(String, String, Vec<String>)>,
}

impl EvidenceBuilder {
    pub fn new(encoder: Arc<IdentityEncoder>) -> Self {
        Self {
            encoder,
            open_world: HashSet::new(),
            query: HashSet::new(),
            closed_world: HashSet::new(),
            facts: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// Mark a (hidden) signature open-world.
    pub fn open_world(mut self, signature: AtomSignature) -> Self {
        self.open_world.insert(signature);
        self
    }

    /// Explicitly request closed-world treatment. Ignored for query signatures.
    pub fn closed_world(mut self, signature: AtomSignature) -> Self {
        self.closed_world.insert(signature);
        self
    }

    /// Mark a query signature. Query signatures are always open-world.
    pub fn query(mut self, signature: AtomSignature) -> Self {
        self.query.insert(signature);
        self
    }

    /// Assert a ground atom.
    pub fn fact<S: Into<String>>(
        mut self,
        signature: AtomSignature,
        constants: impl IntoIterator<Item = S>,
        state: TriState,
    ) -> Self {
        self.facts.push((
            signature,
            constants.into_iter().map(Into::into).collect(),
            state,
        ));
        self
    }

    /// Record `function(args) = value`.
    pub fn function_mapping<S: Into<String>>(
        mut self,
        function: impl Into<String>,
        value: impl Into<String>,
        args: impl IntoIterator<Item = S>,
    ) -> Self {
        self.mappings.push((
            function.into(),
            value.into(),
            args.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn build(self) -> MlnResult<Evidence> {
        for signature in self.query.iter().chain(&self.open_world) {
            self.encoder.identity(signature)?;
        }

        let mut dbs = Vec::with_capacity(self.encoder.identities().len());
        for identity in self.encoder.identities() {
            let signature = identity.signature();
            let is_query = self.query.contains(signature);
            if is_query && self.closed_world.contains(signature) {
                tracing::warn!(
                    %signature,
                    "query predicate declared closed-world, treating it as open-world"
                );
            }
            let closed = !(is_query || self.open_world.contains(signature));
            dbs.push(AtomEvidenceDb::new(identity.clone(), closed));
        }

        let mappers = self
            .encoder
            .schema()
            .functions()
            .iter()
            .cloned()
            .map(FunctionMapper::new)
            .collect();

        let mut evidence = Evidence::from_parts(Arc::clone(&self.encoder), dbs, mappers);
        for (signature, constants, state) in &self.facts {
            evidence.assert_atom(signature, constants.as_slice(), *state)?;
        }
        for (function, value, args) in &self.mappings {
            evidence.add_function_mapping(function, value, args.as_slice())?;
        }

        tracing::debug!(
            facts = self.facts.len(),
            mappings = self.mappings.len(),
            open_world = evidence.dbs().iter().filter(|db| !db.is_closed_world()).count(),
            "built evidence store"
        );
        Ok(evidence)
    }
}
