//! Constant domains: named, ordered sets of constant symbols.
//!
//! A domain maps each constant to a dense index in `[0, len)` and back. The
//! indices are the digits the [`crate::identity`] encoder works with.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Result type for domain operations.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// An ordered, deduplicated set of constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDomain {
    name: String,
    symbols: Vec<String>,
    index: HashMap<String, usize>,
}

impl ConstantDomain {
    /// Build a domain, keeping the first occurrence of duplicate constants.
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symbols = Vec::new();
        let mut index = HashMap::new();
        for constant in constants {
            let constant = constant.into();
            if !index.contains_key(&constant) {
                index.insert(constant.clone(), symbols.len());
                symbols.push(constant);
            }
        }
        Self {
            name: name.into(),
            symbols,
            index,
        }
    }

    /// Domain name (argument type).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the domain has no constants.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Index of a constant, if it belongs to the domain.
    pub fn index_of(&self, constant: &str) -> Option<usize> {
        self.index.get(constant).copied()
    }

    /// Constant at the given index.
    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }

    /// Whether the constant belongs to the domain.
    pub fn contains(&self, constant: &str) -> bool {
        self.index.contains_key(constant)
    }

    /// Iterate over the constants in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }
}

/// All constant domains of a theory, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domains {
    domains: BTreeMap<String, ConstantDomain>,
}

impl Domains {
    /// Create an empty domain set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a domain.
    pub fn insert(&mut self, domain: ConstantDomain) {
        self.domains.insert(domain.name.clone(), domain);
    }

    /// Builder-style [`Domains::insert`].
    pub fn with<I, S>(mut self, name: &str, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(ConstantDomain::new(name, constants));
        self
    }

    /// Look up a domain by name.
    pub fn get(&self, name: &str) -> Option<&ConstantDomain> {
        self.domains.get(name)
    }

    /// Look up a domain, failing with [`DomainError::UnknownDomain`].
    pub fn require(&self, name: &str) -> DomainResult<&ConstantDomain> {
        self.domains.get(name).ok_or_else(|| DomainError::UnknownDomain {
            name: name.to_string(),
        })
    }

    /// Index of `constant` in domain `name`.
    pub fn index_of(&self, name: &str, constant: &str) -> DomainResult<usize> {
        self.require(name)?
            .index_of(constant)
            .ok_or_else(|| DomainError::UnknownConstant {
                domain: name.to_string(),
                constant: constant.to_string(),
            })
    }

    /// Number of domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether there are no domains.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Iterate over domains in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ConstantDomain> {
        self.domains.values()
    }
}

impl From<BTreeMap<String, Vec<String>>> for Domains {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut domains = Domains::new();
        for (name, constants) in raw {
            domains.insert(ConstantDomain::new(name, constants));
        }
        domains
    }
}

/// Serialized form: `{ "time": ["1", "2"], ... }`.
impl Serialize for Domains {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw: BTreeMap<&str, &[String]> = self
            .domains
            .iter()
            .map(|(name, d)| (name.as_str(), d.symbols.as_slice()))
            .collect();
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Domains {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        Ok(Domains::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_ordered() {
        let d = ConstantDomain::new("time", ["1", "2", "3", "4"]);
        assert_eq!(d.len(), 4);
        for (i, c) in d.iter().enumerate() {
            assert_eq!(d.index_of(c), Some(i));
            assert_eq!(d.symbol(i), Some(c));
        }
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let d = ConstantDomain::new("event", ["Walk", "Run", "Walk", "Stop"]);
        assert_eq!(d.len(), 3);
        assert_eq!(d.index_of("Stop"), Some(2));
    }

    #[test]
    fn unknown_lookups_are_errors() {
        let domains = Domains::new().with("time", ["1", "2"]);
        assert!(matches!(
            domains.index_of("event", "Walk"),
            Err(DomainError::UnknownDomain { .. })
        ));
        assert!(matches!(
            domains.index_of("time", "9"),
            Err(DomainError::UnknownConstant { .. })
        ));
        assert_eq!(domains.index_of("time", "2").unwrap(), 1);
    }

    #[test]
    fn serde_uses_plain_map() {
        let domains = Domains::new().with("time", ["1", "2"]);
        let json = serde_json::to_string(&domains).unwrap();
        assert_eq!(json, r#"{"time":["1","2"]}"#);
        let back: Domains = serde_json::from_str(&json).unwrap();
        assert_eq!(back, domains);
    }
}
