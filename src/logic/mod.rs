//! First-order clause model consumed by the grounding engine.
//!
//! The logic front end (parsing, CNF conversion, predicate completion) is an
//! external collaborator: it hands over [`WeightedClause`]s that are already
//! disjunctions of literals. Terms, literals and weights are closed sum types
//! so the grounding engine can match on them exhaustively.

pub mod schema;

use serde::{Deserialize, Serialize};

pub use schema::{FunctionSchema, PredicateSchema, Schema};

/// A predicate (or function) symbol together with its arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomSignature {
    /// Symbol name, e.g. `HoldsAt`.
    pub symbol: String,
    /// Number of arguments.
    pub arity: usize,
}

impl AtomSignature {
    /// Create a new signature.
    pub fn new(symbol: impl Into<String>, arity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            arity,
        }
    }
}

impl std::fmt::Display for AtomSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.symbol, self.arity)
    }
}

/// A free variable. The domain is optional: when absent it is inferred from
/// the argument positions the variable appears in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Function application, e.g. `next(t)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionTerm {
    pub symbol: String,
    pub args: Vec<Term>,
}

/// An argument of an atom or function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Constant(String),
    Variable(Variable),
    Function(FunctionTerm),
}

impl Term {
    /// A constant term.
    pub fn constant(symbol: impl Into<String>) -> Self {
        Term::Constant(symbol.into())
    }

    /// An untyped variable; its domain is inferred during grounding.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Variable {
            name: name.into(),
            domain: None,
        })
    }

    /// A variable with an explicit domain.
    pub fn typed_var(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Term::Variable(Variable {
            name: name.into(),
            domain: Some(domain.into()),
        })
    }

    /// A function application.
    pub fn function(symbol: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Function(FunctionTerm {
            symbol: symbol.into(),
            args,
        })
    }

    /// Visit every variable occurring in this term.
    pub fn for_each_variable<'a>(&'a self, f: &mut impl FnMut(&'a Variable)) {
        match self {
            Term::Constant(_) => {}
            Term::Variable(v) => f(v),
            Term::Function(func) => {
                for arg in &func.args {
                    arg.for_each_variable(f);
                }
            }
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{c}"),
            Term::Variable(v) => write!(f, "{}", v.name),
            Term::Function(func) => {
                write!(f, "{}(", func.symbol)?;
                write_args(f, &func.args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[Term]) -> std::fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

/// A first-order atom `P(t1, ..., tn)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Atom {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }

    /// The atom's signature.
    pub fn signature(&self) -> AtomSignature {
        AtomSignature::new(self.predicate.clone(), self.args.len())
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.predicate)?;
        write_args(f, &self.args)?;
        write!(f, ")")
    }
}

/// A possibly negated atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub positive: bool,
    pub atom: Atom,
}

impl Literal {
    /// Positive literal.
    pub fn pos(atom: Atom) -> Self {
        Self {
            positive: true,
            atom,
        }
    }

    /// Negative literal.
    pub fn neg(atom: Atom) -> Self {
        Self {
            positive: false,
            atom,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.positive {
            write!(f, "!")?;
        }
        write!(f, "{}", self.atom)
    }
}

/// Weight of a first-order clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    /// Infinite weight: the clause must hold in every possible world.
    Hard,
    /// Finite real weight.
    Soft(f64),
}

impl Weight {
    pub fn is_hard(self) -> bool {
        matches!(self, Weight::Hard)
    }

    /// The finite weight, or `None` for hard clauses.
    pub fn soft_value(self) -> Option<f64> {
        match self {
            Weight::Hard => None,
            Weight::Soft(w) => Some(w),
        }
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weight::Hard => write!(f, "hard"),
            Weight::Soft(w) => write!(f, "{w}"),
        }
    }
}

/// Serialized form: a number, or the string `"hard"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawWeight {
    Soft(f64),
    Tag(String),
}

impl Serialize for Weight {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Weight::Hard => RawWeight::Tag("hard".into()).serialize(serializer),
            Weight::Soft(w) => RawWeight::Soft(w).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawWeight::deserialize(deserializer)? {
            RawWeight::Soft(w) if w.is_finite() => Ok(Weight::Soft(w)),
            RawWeight::Soft(w) => Err(serde::de::Error::custom(format!(
                "soft weight must be finite, got {w}"
            ))),
            RawWeight::Tag(tag) if tag.eq_ignore_ascii_case("hard") => Ok(Weight::Hard),
            RawWeight::Tag(tag) => Err(serde::de::Error::custom(format!(
                "expected a number or \"hard\", got \"{tag}\""
            ))),
        }
    }
}

/// Restriction on the substitutions a clause is grounded over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarConstraint {
    /// Both terms must ground to the same constant.
    Equal(Term, Term),
    /// The terms must ground to different constants.
    NotEqual(Term, Term),
}

/// A weighted disjunction of literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedClause {
    /// Unique clause index, referenced by the ground dependency map.
    pub index: usize,
    pub weight: Weight,
    pub literals: Vec<Literal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<VarConstraint>,
}

impl WeightedClause {
    /// A soft clause.
    pub fn soft(index: usize, weight: f64, literals: Vec<Literal>) -> Self {
        Self {
            index,
            weight: Weight::Soft(weight),
            literals,
            constraints: Vec::new(),
        }
    }

    /// A hard clause.
    pub fn hard(index: usize, literals: Vec<Literal>) -> Self {
        Self {
            index,
            weight: Weight::Hard,
            literals,
            constraints: Vec::new(),
        }
    }

    /// Attach a variable constraint.
    pub fn with_constraint(mut self, constraint: VarConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_hard(&self) -> bool {
        self.weight.is_hard()
    }

    /// Distinct variable names in order of first occurrence.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut all: Vec<&Variable> = Vec::new();
        for lit in &self.literals {
            for arg in &lit.atom.args {
                arg.for_each_variable(&mut |v| all.push(v));
            }
        }
        for c in &self.constraints {
            let (a, b) = match c {
                VarConstraint::Equal(a, b) | VarConstraint::NotEqual(a, b) => (a, b),
            };
            a.for_each_variable(&mut |v| all.push(v));
            b.for_each_variable(&mut |v| all.push(v));
        }
        let mut seen: Vec<&Variable> = Vec::with_capacity(all.len());
        for v in all {
            if !seen.iter().any(|s| s.name == v.name) {
                seen.push(v);
            }
        }
        seen
    }
}

impl std::fmt::Display for WeightedClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.weight)?;
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " v ")?;
            }
            write!(f, "{lit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiated_implies_happens() -> WeightedClause {
        WeightedClause::soft(
            0,
            1.5,
            vec![
                Literal::neg(Atom::new(
                    "InitiatedAt",
                    vec![Term::constant("Fight"), Term::var("t")],
                )),
                Literal::pos(Atom::new(
                    "Happens",
                    vec![Term::constant("Abrupt"), Term::var("t")],
                )),
            ],
        )
    }

    #[test]
    fn clause_display() {
        assert_eq!(
            initiated_implies_happens().to_string(),
            "1.5 !InitiatedAt(Fight,t) v Happens(Abrupt,t)"
        );
    }

    #[test]
    fn variables_are_distinct_in_order() {
        let clause = initiated_implies_happens().with_constraint(VarConstraint::NotEqual(
            Term::var("t"),
            Term::var("u"),
        ));
        let names: Vec<&str> = clause.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["t", "u"]);
    }

    #[test]
    fn weight_serde() {
        let hard: Weight = serde_json::from_str("\"hard\"").unwrap();
        assert_eq!(hard, Weight::Hard);
        let soft: Weight = serde_json::from_str("-0.75").unwrap();
        assert_eq!(soft, Weight::Soft(-0.75));
        assert!(serde_json::from_str::<Weight>("\"heavy\"").is_err());
        assert_eq!(serde_json::to_string(&Weight::Hard).unwrap(), "\"hard\"");
    }

    #[test]
    fn signature_display() {
        let atom = Atom::new("HoldsAt", vec![Term::var("f"), Term::var("t")]);
        assert_eq!(atom.signature().to_string(), "HoldsAt/2");
    }
}
