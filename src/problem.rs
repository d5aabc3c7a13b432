//! Problem files: a complete theory plus evidence as one JSON document.
//!
//! ```json
//! {
//!   "domains": { "event": ["Abrupt", "Fight"], "time": ["1", "2"] },
//!   "predicates": [{ "symbol": "Happens", "args": ["event", "time"] }],
//!   "functions": [],
//!   "clauses": [{ "index": 0, "weight": 1.5, "literals": [...] }],
//!   "evidence": [{ "predicate": "Happens", "args": ["Fight", "1"] }],
//!   "query": [{ "symbol": "Happens", "arity": 2 }]
//! }
//! ```
//!
//! Clauses are already in clausal form; terms use the structured
//! [`Term`](crate::logic::Term) representation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Domains;
use crate::error::MlnResult;
use crate::evidence::{Evidence, EvidenceBuilder, TriState};
use crate::identity::IdentityEncoder;
use crate::logic::{AtomSignature, Schema, WeightedClause};

/// Errors reading or writing problem files.
#[derive(Debug, Error, Diagnostic)]
pub enum ProblemError {
    #[error("failed to read problem file: {path}")]
    #[diagnostic(
        code(mln::problem::read),
        help("Ensure the problem file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse problem {path}: {message}")]
    #[diagnostic(
        code(mln::problem::parse),
        help(
            "A problem file is a JSON object with `domains`, `predicates`, `functions`, \
             `clauses`, `evidence`, `function_mappings`, `open_world` and `query` fields."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to write problem file: {path}")]
    #[diagnostic(
        code(mln::problem::write),
        help("Check that the target directory exists and is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A ground atom asserted by the evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAtom {
    pub predicate: String,
    pub args: Vec<String>,
    #[serde(default = "asserted_true")]
    pub state: TriState,
}

fn asserted_true() -> TriState {
    TriState::True
}

impl EvidenceAtom {
    pub fn new<S: Into<String>>(predicate: &str, args: impl IntoIterator<Item = S>, state: TriState) -> Self {
        Self {
            predicate: predicate.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            state,
        }
    }

    pub fn signature(&self) -> AtomSignature {
        AtomSignature::new(self.predicate.clone(), self.args.len())
    }
}

/// `function(args) = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMapping {
    pub function: String,
    pub value: String,
    pub args: Vec<String>,
}

/// A theory with its evidence and query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub domains: Domains,
    #[serde(flatten)]
    pub schema: Schema,
    #[serde(default)]
    pub clauses: Vec<WeightedClause>,
    #[serde(default)]
    pub evidence: Vec<EvidenceAtom>,
    #[serde(default)]
    pub function_mappings: Vec<FunctionMapping>,
    /// Hidden predicates without a closed-world assumption.
    #[serde(default)]
    pub open_world: Vec<AtomSignature>,
    #[serde(default)]
    pub query: Vec<AtomSignature>,
}

impl Problem {
    pub fn load(path: &Path) -> Result<Self, ProblemError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ProblemError::Read {
            path: display.clone(),
            source,
        })?;
        Self::parse(&text, &display)
    }

    /// Parse a problem from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProblemError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, path: &str) -> Result<Self, ProblemError> {
        let problem: Problem = serde_json::from_str(text).map_err(|e| ProblemError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            path,
            domains = problem.domains.len(),
            predicates = problem.schema.predicates().len(),
            functions = problem.schema.functions().len(),
            clauses = problem.clauses.len(),
            evidence = problem.evidence.len(),
            "loaded problem"
        );
        Ok(problem)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProblemError> {
        let display = path.display().to_string();
        let text = serde_json::to_string_pretty(self).map_err(|e| ProblemError::Parse {
            path: display.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text).map_err(|source| ProblemError::Write {
            path: display,
            source,
        })
    }

    /// Lay out the ground atom ids of the theory.
    pub fn encoder(&self) -> MlnResult<Arc<IdentityEncoder>> {
        let encoder = IdentityEncoder::new(&self.schema, Arc::new(self.domains.clone()))?;
        Ok(Arc::new(encoder))
    }

    /// Build the evidence store over `encoder`, which must come from
    /// [`Problem::encoder`].
    pub fn evidence(&self, encoder: Arc<IdentityEncoder>) -> MlnResult<Evidence> {
        let mut builder = EvidenceBuilder::new(encoder);
        for signature in &self.open_world {
            builder = builder.open_world(signature.clone());
        }
        for signature in &self.query {
            builder = builder.query(signature.clone());
        }
        for atom in &self.evidence {
            builder = builder.fact(atom.signature(), atom.args.iter().cloned(), atom.state);
        }
        for mapping in &self.function_mappings {
            builder = builder.function_mapping(
                mapping.function.clone(),
                mapping.value.clone(),
                mapping.args.iter().cloned(),
            );
        }
        builder.build()
    }
}

/// Default location of a problem's companion config: `<problem>.toml`.
pub fn companion_config(problem: &Path) -> PathBuf {
    problem.with_extension("toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Atom, Literal, Term};

    const FIGHT: &str = r#"{
        "domains": { "event": ["Abrupt", "Fight"], "time": ["1", "2"] },
        "predicates": [
            { "symbol": "Happens", "args": ["event", "time"] },
            { "symbol": "InitiatedAt", "args": ["event", "time"] }
        ],
        "clauses": [{
            "index": 0,
            "weight": 1.5,
            "literals": [
                { "positive": false, "atom": { "predicate": "InitiatedAt",
                  "args": [{ "Constant": "Fight" }, { "Variable": { "name": "t" } }] } },
                { "positive": true, "atom": { "predicate": "Happens",
                  "args": [{ "Constant": "Abrupt" }, { "Variable": { "name": "t" } }] } }
            ]
        }],
        "evidence": [
            { "predicate": "Happens", "args": ["Abrupt", "1"], "state": "False" },
            { "predicate": "Happens", "args": ["Fight", "2"] }
        ],
        "query": [{ "symbol": "InitiatedAt", "arity": 2 }]
    }"#;

    #[test]
    fn parses_and_builds_evidence() {
        let problem = Problem::from_json(FIGHT).unwrap();
        assert_eq!(problem.schema.predicates().len(), 2);
        assert_eq!(problem.clauses.len(), 1);
        assert_eq!(problem.evidence[1].state, TriState::True);

        let encoder = problem.encoder().unwrap();
        let evidence = problem.evidence(Arc::clone(&encoder)).unwrap();
        let happens = AtomSignature::new("Happens", 2);
        let id = encoder.encode(&happens, &["Fight", "2"]).unwrap();
        assert_eq!(evidence.get(&happens, id).unwrap(), TriState::True);
        let id = encoder.encode(&happens, &["Abrupt", "2"]).unwrap();
        assert_eq!(evidence.get(&happens, id).unwrap(), TriState::False);
        let initiated = AtomSignature::new("InitiatedAt", 2);
        assert!(evidence.is_open_world(&initiated).unwrap());
    }

    #[test]
    fn clause_terms_are_structured() {
        let problem = Problem::from_json(FIGHT).unwrap();
        let expected = Literal::neg(Atom::new(
            "InitiatedAt",
            vec![Term::constant("Fight"), Term::var("t")],
        ));
        assert_eq!(problem.clauses[0].literals[0], expected);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fight.json");
        let problem = Problem::from_json(FIGHT).unwrap();
        problem.save(&path).unwrap();
        assert_eq!(Problem::load(&path).unwrap(), problem);
        assert_eq!(companion_config(&path), dir.path().join("fight.toml"));
    }

    #[test]
    fn reports_parse_and_read_errors() {
        assert!(matches!(
            Problem::from_json("{ \"domains\": 3 }"),
            Err(ProblemError::Parse { .. })
        ));
        assert!(matches!(
            Problem::load(Path::new("/nonexistent/problem.json")),
            Err(ProblemError::Read { .. })
        ));
    }

    #[test]
    fn unknown_evidence_predicate_is_rejected() {
        let mut problem = Problem::from_json(FIGHT).unwrap();
        problem
            .evidence
            .push(EvidenceAtom::new("Walks", ["Fight"], TriState::True));
        let encoder = problem.encoder().unwrap();
        assert!(problem.evidence(encoder).is_err());
    }
}
