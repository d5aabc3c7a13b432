//! Identity encoder: ground atom ⇄ dense integer id.
//!
//! Each signature owns a contiguous block of ids `[start, start + N)` where `N`
//! is the product of its argument domain sizes. Inside a block a constant tuple
//! is a number written in a mixed radix whose digits are the constants' domain
//! indices (first argument = least significant digit). Blocks are laid out in
//! declaration order starting at id 1.

use std::collections::HashMap;
use std::sync::Arc;

use crate::atom::AtomId;
use crate::domain::Domains;
use crate::error::{IdentityError, MlnResult};
use crate::logic::{AtomSignature, PredicateSchema, Schema};

/// Result type for identity operations.
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

/// Id block of a single signature.
#[derive(Debug, Clone)]
pub struct AtomIdentity {
    signature: AtomSignature,
    /// Domain name per argument position.
    domains: Vec<String>,
    /// Domain size per argument position (the radix of each digit).
    lengths: Vec<usize>,
    /// Positional weight of each digit.
    strides: Vec<u32>,
    start: u32,
    len: u32,
}

impl AtomIdentity {
    fn build(schema: &PredicateSchema, domains: &Domains, start: u32) -> MlnResult<Self> {
        let mut lengths = Vec::with_capacity(schema.args.len());
        let mut strides = Vec::with_capacity(schema.args.len());
        let mut size: u128 = 1;
        for arg in &schema.args {
            let len = domains.require(arg)?.len();
            strides.push(size as u32);
            lengths.push(len);
            size *= len as u128;
            if u128::from(start) + size > u128::from(AtomId::MAX) + 1 {
                return Err(IdentityError::SpaceExhausted {
                    atoms: u128::from(start) + size,
                }
                .into());
            }
        }
        Ok(Self {
            signature: schema.signature(),
            domains: schema.args.clone(),
            lengths,
            strides,
            start,
            len: size as u32,
        })
    }

    pub fn signature(&self) -> &AtomSignature {
        &self.signature
    }

    /// Domain names of the argument positions.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// First id of the block.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the last id of the block.
    pub fn end(&self) -> u32 {
        self.start + self.len
    }

    /// Number of ground atoms of this signature.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `id` falls inside this signature's block.
    pub fn contains(&self, id: AtomId) -> bool {
        (self.start..self.end()).contains(&id.get())
    }

    /// All ids of this signature.
    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        (self.start..self.end()).filter_map(AtomId::new)
    }

    /// Encode a tuple of domain indices.
    ///
    /// Returns `None` on arity mismatch or when an index exceeds its domain.
    pub fn encode_indices(&self, indices: &[usize]) -> Option<AtomId> {
        if indices.len() != self.lengths.len() {
            return None;
        }
        let mut offset: u32 = 0;
        for ((&idx, &len), &stride) in indices.iter().zip(&self.lengths).zip(&self.strides) {
            if idx >= len {
                return None;
            }
            offset += idx as u32 * stride;
        }
        AtomId::new(self.start + offset)
    }

    /// Decode an id back into domain indices.
    pub fn decode_indices(&self, id: AtomId) -> IdentityResult<Vec<usize>> {
        if !self.contains(id) {
            return Err(IdentityError::OutOfRange {
                signature: self.signature.to_string(),
                id: id.get(),
                start: self.start,
                end: self.end(),
            });
        }
        let mut rest = (id.get() - self.start) as usize;
        let mut indices = Vec::with_capacity(self.lengths.len());
        for &len in &self.lengths {
            indices.push(rest % len);
            rest /= len;
        }
        Ok(indices)
    }
}

/// Global id layout over every declared signature.
#[derive(Debug, Clone)]
pub struct IdentityEncoder {
    schema: Schema,
    domains: Arc<Domains>,
    identities: Vec<AtomIdentity>,
    by_signature: HashMap<AtomSignature, usize>,
}

impl IdentityEncoder {
    /// Lay out id blocks for every predicate, then every function's auxiliary
    /// predicate, in declaration order.
    pub fn new(schema: &Schema, domains: Arc<Domains>) -> MlnResult<Self> {
        schema.validate(&domains)?;
        let mut identities = Vec::new();
        let mut by_signature = HashMap::new();
        let mut next: u32 = 1;
        for predicate in schema.layout() {
            let identity = AtomIdentity::build(&predicate, &domains, next)?;
            next = identity.end();
            by_signature.insert(identity.signature.clone(), identities.len());
            identities.push(identity);
        }
        tracing::debug!(
            signatures = identities.len(),
            atoms = next - 1,
            "laid out ground atom identities"
        );
        Ok(Self {
            schema: schema.clone(),
            domains,
            identities,
            by_signature,
        })
    }

    /// The predicate and function declarations the layout was built from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The constant domains the layout was built from.
    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    /// Shared handle to the domains.
    pub fn domains_arc(&self) -> Arc<Domains> {
        Arc::clone(&self.domains)
    }

    /// All identities in layout order.
    pub fn identities(&self) -> &[AtomIdentity] {
        &self.identities
    }

    /// Total number of ground atoms over all signatures.
    pub fn atom_count(&self) -> u32 {
        self.identities.last().map(|i| i.end() - 1).unwrap_or(0)
    }

    /// Identity block of a signature.
    pub fn identity(&self, signature: &AtomSignature) -> IdentityResult<&AtomIdentity> {
        self.by_signature
            .get(signature)
            .map(|&i| &self.identities[i])
            .ok_or_else(|| IdentityError::UnknownSignature {
                signature: signature.to_string(),
            })
    }

    /// Encode a constant tuple.
    pub fn encode<S: AsRef<str>>(
        &self,
        signature: &AtomSignature,
        constants: &[S],
    ) -> IdentityResult<AtomId> {
        let identity = self.identity(signature)?;
        if constants.len() != identity.lengths.len() {
            return Err(IdentityError::ArityMismatch {
                signature: signature.to_string(),
                expected: identity.lengths.len(),
                actual: constants.len(),
            });
        }
        let mut indices = Vec::with_capacity(constants.len());
        for (position, (constant, domain_name)) in
            constants.iter().zip(&identity.domains).enumerate()
        {
            let constant = constant.as_ref();
            let index = self
                .domains
                .get(domain_name)
                .and_then(|d| d.index_of(constant))
                .ok_or_else(|| IdentityError::DomainMismatch {
                    signature: signature.to_string(),
                    position,
                    constant: constant.to_string(),
                    domain: domain_name.clone(),
                })?;
            indices.push(index);
        }
        identity
            .encode_indices(&indices)
            .ok_or_else(|| IdentityError::OutOfRange {
                signature: signature.to_string(),
                id: 0,
                start: identity.start,
                end: identity.end(),
            })
    }

    /// Decode an id of the given signature into its constants.
    pub fn decode(&self, signature: &AtomSignature, id: AtomId) -> IdentityResult<Vec<String>> {
        let identity = self.identity(signature)?;
        self.decode_with(identity, id)
    }

    /// The identity block containing `id`.
    pub fn identity_of(&self, id: AtomId) -> Option<&AtomIdentity> {
        let raw = id.get();
        let pos = self.identities.partition_point(|i| i.end() <= raw);
        self.identities.get(pos).filter(|i| i.contains(id))
    }

    /// Decode any id into its signature and constants.
    pub fn decode_atom(&self, id: AtomId) -> IdentityResult<(AtomSignature, Vec<String>)> {
        let identity = self.identity_of(id).ok_or_else(|| IdentityError::OutOfRange {
            signature: "<any>".into(),
            id: id.get(),
            start: 1,
            end: self.atom_count() + 1,
        })?;
        Ok((identity.signature.clone(), self.decode_with(identity, id)?))
    }

    /// Render a ground atom as `Symbol(c1,c2,...)`.
    pub fn format_atom(&self, id: AtomId) -> IdentityResult<String> {
        let (signature, constants) = self.decode_atom(id)?;
        Ok(format!("{}({})", signature.symbol, constants.join(",")))
    }

    fn decode_with(&self, identity: &AtomIdentity, id: AtomId) -> IdentityResult<Vec<String>> {
        let indices = identity.decode_indices(id)?;
        Ok(indices
            .iter()
            .zip(&identity.domains)
            .map(|(&idx, name)| {
                self.domains
                    .get(name)
                    .and_then(|d| d.symbol(idx))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> IdentityEncoder {
        let domains = Domains::new()
            .with("event", ["Walk", "Run", "Abrupt"])
            .with("time", ["1", "2", "3", "4"])
            .with("fluent", ["Fight", "Meet"]);
        let schema = Schema::new()
            .predicate("Happens", ["event", "time"])
            .predicate("HoldsAt", ["fluent", "time"])
            .predicate("Alarm", Vec::<String>::new())
            .function("next", "time", ["time"]);
        IdentityEncoder::new(&schema, Arc::new(domains)).unwrap()
    }

    #[test]
    fn blocks_are_contiguous_from_one() {
        let enc = encoder();
        let ids: Vec<(u32, u32)> = enc
            .identities()
            .iter()
            .map(|i| (i.start(), i.end()))
            .collect();
        assert_eq!(ids, vec![(1, 13), (13, 21), (21, 22), (22, 38)]);
        assert_eq!(enc.atom_count(), 37);
    }

    #[test]
    fn round_trip_and_global_uniqueness() {
        let enc = encoder();
        let mut seen = std::collections::HashSet::new();
        for identity in enc.identities() {
            for id in identity.ids() {
                let constants = enc.decode(identity.signature(), id).unwrap();
                let back = enc.encode(identity.signature(), &constants).unwrap();
                assert_eq!(back, id);
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len() as u32, enc.atom_count());
    }

    #[test]
    fn first_argument_is_least_significant() {
        let enc = encoder();
        let sig = AtomSignature::new("Happens", 2);
        assert_eq!(enc.encode(&sig, &["Walk", "1"]).unwrap().get(), 1);
        assert_eq!(enc.encode(&sig, &["Run", "1"]).unwrap().get(), 2);
        assert_eq!(enc.encode(&sig, &["Walk", "2"]).unwrap().get(), 4);
    }

    #[test]
    fn encode_rejects_foreign_constants() {
        let enc = encoder();
        let sig = AtomSignature::new("Happens", 2);
        assert!(matches!(
            enc.encode(&sig, &["Fight", "1"]),
            Err(IdentityError::DomainMismatch { position: 0, .. })
        ));
        assert!(matches!(
            enc.encode(&sig, &["Walk"]),
            Err(IdentityError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_ids_outside_block() {
        let enc = encoder();
        let sig = AtomSignature::new("HoldsAt", 2);
        let foreign = AtomId::new(1).unwrap();
        assert!(matches!(
            enc.decode(&sig, foreign),
            Err(IdentityError::OutOfRange { .. })
        ));
    }

    #[test]
    fn identity_of_finds_block() {
        let enc = encoder();
        let id = AtomId::new(21).unwrap();
        assert_eq!(enc.identity_of(id).unwrap().signature().symbol, "Alarm");
        assert_eq!(enc.format_atom(id).unwrap(), "Alarm()");
        assert!(enc.identity_of(AtomId::new(38).unwrap()).is_none());
        let aux = enc.format_atom(AtomId::new(22).unwrap()).unwrap();
        assert_eq!(aux, "AUXnext(1,1)");
    }
}
