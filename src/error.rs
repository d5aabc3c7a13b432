//! Rich diagnostic error types for the MLN engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Inference quality problems (local search running out of flips) are not
//! errors: they are counted in [`crate::infer::InferenceStats`] and logged.

use miette::Diagnostic;
use thiserror::Error;

use crate::problem::ProblemError;

/// Top-level error type for the MLN engine.
#[derive(Debug, Error, Diagnostic)]
pub enum MlnError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Grounding(#[from] GroundingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Problem(#[from] ProblemError),
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DomainError {
    #[error("unknown constant domain \"{name}\"")]
    #[diagnostic(
        code(mln::domain::unknown),
        help(
            "Every argument type used by a predicate or function schema must be \
             declared as a constant domain. Add a `{name}` entry to the domains."
        )
    )]
    UnknownDomain { name: String },

    #[error("constant domain \"{name}\" is empty")]
    #[diagnostic(
        code(mln::domain::empty),
        help("A domain needs at least one constant to be grounded over.")
    )]
    EmptyDomain { name: String },

    #[error("constant \"{constant}\" is not a member of domain \"{domain}\"")]
    #[diagnostic(
        code(mln::domain::unknown_constant),
        help("Declare the constant in the domain, or fix the argument that uses it.")
    )]
    UnknownConstant { domain: String, constant: String },
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IdentityError {
    #[error("unknown atom signature {signature}")]
    #[diagnostic(
        code(mln::identity::unknown_signature),
        help("The predicate (or function) is not part of the declared schema.")
    )]
    UnknownSignature { signature: String },

    #[error("signature {signature} declared twice")]
    #[diagnostic(
        code(mln::identity::duplicate_signature),
        help("Each symbol/arity pair may only be declared once in the schema.")
    )]
    DuplicateSignature { signature: String },

    #[error("{signature} expects {expected} argument(s), got {actual}")]
    #[diagnostic(
        code(mln::identity::arity_mismatch),
        help("The constant tuple must have exactly one constant per schema position.")
    )]
    ArityMismatch {
        signature: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {position} of {signature}: \"{constant}\" is not in domain \"{domain}\"")]
    #[diagnostic(
        code(mln::identity::domain_mismatch),
        help(
            "Ground atoms can only be built from constants of the declared argument \
             domain. Add the constant to the domain or fix the evidence/clause."
        )
    )]
    DomainMismatch {
        signature: String,
        position: usize,
        constant: String,
        domain: String,
    },

    #[error("atom id {id} is outside the block [{start}, {end}) of {signature}")]
    #[diagnostic(
        code(mln::identity::out_of_range),
        help("The id was not produced by this signature's encoder.")
    )]
    OutOfRange {
        signature: String,
        id: u32,
        start: u32,
        end: u32,
    },

    #[error("ground atom space exhausted: {atoms} atoms do not fit in 31-bit ids")]
    #[diagnostic(
        code(mln::identity::exhausted),
        help(
            "The product of the domain sizes is too large. Reduce the domains, \
             or split the theory into smaller problems."
        )
    )]
    SpaceExhausted { atoms: u128 },
}

// ---------------------------------------------------------------------------
// Evidence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EvidenceError {
    #[error("no evidence table for {signature}")]
    #[diagnostic(
        code(mln::evidence::unknown_signature),
        help("Evidence can only be asserted for predicates declared in the schema.")
    )]
    UnknownSignature { signature: String },

    #[error("unknown function \"{function}\"")]
    #[diagnostic(
        code(mln::evidence::unknown_function),
        help("Declare the function in the schema before giving mappings for it.")
    )]
    UnknownFunction { function: String },

    #[error("function {function}({args}) already maps to \"{existing}\", cannot remap to \"{value}\"")]
    #[diagnostic(
        code(mln::evidence::function_conflict),
        help("A function has exactly one return value per argument tuple.")
    )]
    FunctionMappingConflict {
        function: String,
        args: String,
        existing: String,
        value: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),
}

// ---------------------------------------------------------------------------
// Grounding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GroundingError {
    #[error("clause #{clause}: variable \"{variable}\" has no domain")]
    #[diagnostic(
        code(mln::ground::missing_domain),
        help(
            "The variable's type could not be inferred from any predicate or function \
             argument. Annotate it with a domain name."
        )
    )]
    MissingDomain { clause: usize, variable: String },

    #[error("clause #{clause}: variable \"{variable}\" used as both \"{first}\" and \"{second}\"")]
    #[diagnostic(
        code(mln::ground::conflicting_domains),
        help("A variable ranges over exactly one domain within a clause.")
    )]
    ConflictingDomains {
        clause: usize,
        variable: String,
        first: String,
        second: String,
    },

    #[error("clause #{clause}: {message}")]
    #[diagnostic(
        code(mln::ground::malformed_clause),
        help("Check the clause against the predicate and function schema.")
    )]
    MalformedClause { clause: usize, message: String },

    #[error("hard clause #{clause} is violated by the evidence under {substitution}")]
    #[diagnostic(
        code(mln::ground::hard_violated),
        help(
            "Every literal of a hard clause was contradicted by the evidence, so no \
             possible world satisfies the theory. Fix the evidence or soften the clause."
        )
    )]
    HardClauseViolated { clause: usize, substitution: String },

    #[error("hard clauses {clauses:?} demand opposite truth values for atom {atom}")]
    #[diagnostic(
        code(mln::ground::conflicting_hard),
        help("The hard part of the theory is unsatisfiable for this evidence.")
    )]
    ConflictingHardConstraints { atom: u32, clauses: Vec<usize> },

    #[error("failed to build the grounding thread pool: {message}")]
    #[diagnostic(
        code(mln::ground::thread_pool),
        help("Lower `grounding.threads` or leave it unset to use the global pool.")
    )]
    ThreadPool { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("invalid solver parameter `{name}` = {value}: expected {expected}")]
    #[diagnostic(
        code(mln::infer::invalid_parameter),
        help("Solver parameters are validated before any sampling starts; fix the value.")
    )]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("failed to build the inference thread pool: {message}")]
    #[diagnostic(
        code(mln::infer::thread_pool),
        help("Lower the number of chains or threads.")
    )]
    ThreadPool { message: String },

    #[error("result sink error: {source}")]
    #[diagnostic(
        code(mln::infer::io),
        help("The marginal/MAP writer failed. Check that the output location is writable.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(mln::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(mln::config::parse),
        help("Check the TOML syntax and the section/field names.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(mln::config::invalid), help("{message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning MLN results.
pub type MlnResult<T> = std::result::Result<T, MlnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_error_converts_to_mln_error() {
        let err = IdentityError::OutOfRange {
            signature: "Happens/2".into(),
            id: 99,
            start: 1,
            end: 9,
        };
        let mln: MlnError = err.into();
        assert!(matches!(
            mln,
            MlnError::Identity(IdentityError::OutOfRange { .. })
        ));
    }

    #[test]
    fn grounding_error_wraps_identity_error() {
        let err = IdentityError::UnknownSignature {
            signature: "Foo/1".into(),
        };
        let ground: GroundingError = err.into();
        assert!(matches!(
            ground,
            GroundingError::Identity(IdentityError::UnknownSignature { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = InferError::InvalidParameter {
            name: "probability_best",
            value: "1.5".into(),
            expected: "a probability in [0, 1]",
        };
        let msg = format!("{err}");
        assert!(msg.contains("probability_best"));
        assert!(msg.contains("1.5"));
    }
}
