//! Forward lookup for function-mapping evidence.

use std::collections::HashMap;

use crate::error::{EvidenceError, IdentityError};
use crate::identity::IdentityEncoder;
use crate::logic::{AtomSignature, FunctionSchema};

use super::EvidenceResult;

/// Maps argument index tuples of a function to the index of its return value.
#[derive(Debug, Clone)]
pub struct FunctionMapper {
    schema: FunctionSchema,
    auxiliary: AtomSignature,
    map: HashMap<Vec<usize>, usize>,
}

impl FunctionMapper {
    pub fn new(schema: FunctionSchema) -> Self {
        let auxiliary = schema.auxiliary().signature();
        Self {
            schema,
            auxiliary,
            map: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.schema.symbol
    }

    pub fn arity(&self) -> usize {
        self.schema.args.len()
    }

    pub fn schema(&self) -> &FunctionSchema {
        &self.schema
    }

    /// Signature of the auxiliary return-value predicate.
    pub fn auxiliary(&self) -> &AtomSignature {
        &self.auxiliary
    }

    /// Number of mapped argument tuples.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Return-value index for the given argument indices.
    pub fn apply(&self, args: &[usize]) -> Option<usize> {
        self.map.get(args).copied()
    }

    pub(crate) fn insert<S: AsRef<str>>(
        &mut self,
        encoder: &IdentityEncoder,
        value: &str,
        args: &[S],
    ) -> EvidenceResult<()> {
        let signature = self.schema.signature().to_string();
        let domains = encoder.domains();
        let lookup = |position: usize, domain: &str, constant: &str| {
            domains
                .get(domain)
                .and_then(|d| d.index_of(constant))
                .ok_or_else(|| IdentityError::DomainMismatch {
                    signature: signature.clone(),
                    position,
                    constant: constant.to_string(),
                    domain: domain.to_string(),
                })
        };

        let ret = lookup(0, &self.schema.returns, value)?;
        let mut indices = Vec::with_capacity(args.len());
        for (i, (arg, domain)) in args.iter().zip(&self.schema.args).enumerate() {
            indices.push(lookup(i + 1, domain, arg.as_ref())?);
        }

        match self.map.get(&indices) {
            Some(&existing) if existing != ret => Err(EvidenceError::FunctionMappingConflict {
                function: self.schema.symbol.clone(),
                args: args
                    .iter()
                    .map(|a| a.as_ref())
                    .collect::<Vec<_>>()
                    .join(","),
                existing: domains
                    .get(&self.schema.returns)
                    .and_then(|d| d.symbol(existing))
                    .unwrap_or_default()
                    .to_string(),
                value: value.to_string(),
            }),
            _ => {
                self.map.insert(indices, ret);
                Ok(())
            }
        }
    }
}
