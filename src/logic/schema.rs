//! Predicate and function schemas: argument domains per signature.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::Domains;
use crate::error::{DomainError, IdentityError, MlnResult};

use super::AtomSignature;

/// Prefix of the auxiliary predicates functions are flattened into.
pub const FUNCTION_PREFIX: &str = "AUX";

/// Argument domains of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSchema {
    pub symbol: String,
    /// Domain name of each argument position.
    pub args: Vec<String>,
}

impl PredicateSchema {
    pub fn new<I, S>(symbol: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn signature(&self) -> AtomSignature {
        AtomSignature::new(self.symbol.clone(), self.args.len())
    }
}

/// A function `f: args -> returns`, flattened into the auxiliary predicate
/// `AUXf(ret, arg1, ..., argn)` whose first argument is the return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub symbol: String,
    pub returns: String,
    pub args: Vec<String>,
}

impl FunctionSchema {
    pub fn new<I, S>(symbol: impl Into<String>, returns: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            returns: returns.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Signature of the function itself (`f/n`).
    pub fn signature(&self) -> AtomSignature {
        AtomSignature::new(self.symbol.clone(), self.args.len())
    }

    /// The auxiliary return-value predicate this function is stored as.
    pub fn auxiliary(&self) -> PredicateSchema {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.returns.clone());
        args.extend(self.args.iter().cloned());
        PredicateSchema {
            symbol: format!("{FUNCTION_PREFIX}{}", self.symbol),
            args,
        }
    }
}

/// All predicate and function declarations of a theory, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    predicates: Vec<PredicateSchema>,
    #[serde(default)]
    functions: Vec<FunctionSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a predicate.
    pub fn predicate<I, S>(mut self, symbol: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.push(PredicateSchema::new(symbol, args));
        self
    }

    /// Declare a function.
    pub fn function<I, S>(mut self, symbol: &str, returns: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions.push(FunctionSchema::new(symbol, returns, args));
        self
    }

    pub fn predicates(&self) -> &[PredicateSchema] {
        &self.predicates
    }

    pub fn functions(&self) -> &[FunctionSchema] {
        &self.functions
    }

    /// Predicate schemas followed by the auxiliary predicates of all functions:
    /// the order ground-atom id blocks are laid out in.
    pub fn layout(&self) -> Vec<PredicateSchema> {
        self.predicates
            .iter()
            .cloned()
            .chain(self.functions.iter().map(FunctionSchema::auxiliary))
            .collect()
    }

    /// Look up a predicate by signature.
    pub fn find_predicate(&self, signature: &AtomSignature) -> Option<&PredicateSchema> {
        self.predicates
            .iter()
            .find(|p| p.symbol == signature.symbol && p.args.len() == signature.arity)
    }

    /// Look up a function by symbol and arity.
    pub fn find_function(&self, symbol: &str, arity: usize) -> Option<&FunctionSchema> {
        self.functions
            .iter()
            .find(|f| f.symbol == symbol && f.args.len() == arity)
    }

    /// Check that every referenced domain exists and no signature is declared twice.
    pub fn validate(&self, domains: &Domains) -> MlnResult<()> {
        let mut seen: HashSet<AtomSignature> = HashSet::new();
        for p in self.layout() {
            if !seen.insert(p.signature()) {
                return Err(IdentityError::DuplicateSignature {
                    signature: p.signature().to_string(),
                }
                .into());
            }
            for arg in &p.args {
                let domain = domains.require(arg)?;
                if domain.is_empty() {
                    return Err(DomainError::EmptyDomain { name: arg.clone() }.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_appends_auxiliary_function_predicates() {
        let schema = Schema::new()
            .predicate("Happens", ["event", "time"])
            .function("next", "time", ["time"]);
        let layout = schema.layout();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout[1].symbol, "AUXnext");
        assert_eq!(layout[1].args, vec!["time", "time"]);
    }

    #[test]
    fn validate_reports_missing_domain() {
        let schema = Schema::new().predicate("Happens", ["event", "time"]);
        let domains = Domains::new().with("time", ["1"]);
        assert!(schema.validate(&domains).is_err());
    }

    #[test]
    fn validate_rejects_duplicates() {
        let schema = Schema::new()
            .predicate("P", ["d"])
            .predicate("P", ["d"]);
        let domains = Domains::new().with("d", ["a"]);
        assert!(matches!(
            schema.validate(&domains),
            Err(crate::error::MlnError::Identity(
                IdentityError::DuplicateSignature { .. }
            ))
        ));
    }
}
