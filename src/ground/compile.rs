//! Clause compilation.
//!
//! Before enumerating substitutions every clause is resolved once against the
//! schema, the domains, the function mappers and the builtin registry. The
//! compiled form evaluates a substitution directly on domain indices, so the
//! hot loop never looks up a symbol by name unless a builtin function produced
//! a fresh constant.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::atom::GroundLiteral;
use crate::builtins::{BuiltinRegistry, FunctionFn, PredicateFn};
use crate::domain::ConstantDomain;
use crate::error::GroundingError;
use crate::evidence::{AtomEvidenceDb, Evidence, FunctionMapper};
use crate::logic::{Literal, Term, VarConstraint, WeightedClause};

type CompileResult<T> = std::result::Result<T, GroundingError>;

/// A value a term evaluates to under a substitution.
#[derive(Debug, Clone)]
enum Value<'a> {
    /// A constant known by its index in a domain.
    Index(&'a ConstantDomain, usize),
    /// A constant known only by its symbol.
    Text(Cow<'a, str>),
}

impl Value<'_> {
    fn as_str(&self) -> &str {
        match self {
            Value::Index(domain, i) => domain.symbol(*i).unwrap_or_default(),
            Value::Text(s) => s.as_ref(),
        }
    }

    fn index_in(&self, domain: &ConstantDomain) -> Option<usize> {
        match self {
            Value::Index(d, i) if same_domain(d, domain) => Some(*i),
            _ => domain.index_of(self.as_str()),
        }
    }

    fn same_constant(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::Index(a, i), Value::Index(b, j)) if same_domain(a, b) => i == j,
            _ => self.as_str() == other.as_str(),
        }
    }
}

fn same_domain(a: &ConstantDomain, b: &ConstantDomain) -> bool {
    std::ptr::eq(a, b) || a.name() == b.name()
}

#[derive(Debug)]
enum CompiledTerm<'a> {
    Constant(Value<'a>),
    Variable(usize),
    Mapped {
        mapper: &'a FunctionMapper,
        args: Vec<(CompiledTerm<'a>, &'a ConstantDomain)>,
        returns: &'a ConstantDomain,
    },
    Builtin {
        eval: FunctionFn,
        args: Vec<CompiledTerm<'a>>,
    },
}

impl<'a> CompiledTerm<'a> {
    /// `None` when a function is undefined for the arguments.
    fn eval(&self, binding: &[usize], vars: &[VarSlot<'a>]) -> Option<Value<'a>> {
        match self {
            CompiledTerm::Constant(value) => Some(value.clone()),
            CompiledTerm::Variable(slot) => Some(Value::Index(vars[*slot].domain, binding[*slot])),
            CompiledTerm::Mapped {
                mapper,
                args,
                returns,
            } => {
                let mut indices = Vec::with_capacity(args.len());
                for (arg, domain) in args {
                    indices.push(arg.eval(binding, vars)?.index_in(domain)?);
                }
                mapper.apply(&indices).map(|i| Value::Index(returns, i))
            }
            CompiledTerm::Builtin { eval, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(binding, vars))
                    .collect::<Option<Vec<_>>>()?;
                let symbols: Vec<&str> = values.iter().map(Value::as_str).collect();
                eval(&symbols).map(|s| Value::Text(Cow::Owned(s)))
            }
        }
    }
}

#[derive(Debug)]
enum CompiledLiteral<'a> {
    Atom {
        positive: bool,
        db: &'a AtomEvidenceDb,
        args: Vec<(CompiledTerm<'a>, &'a ConstantDomain)>,
    },
    Builtin {
        positive: bool,
        eval: PredicateFn,
        args: Vec<CompiledTerm<'a>>,
    },
}

#[derive(Debug)]
struct CompiledConstraint<'a> {
    equal: bool,
    left: CompiledTerm<'a>,
    right: CompiledTerm<'a>,
}

/// A clause variable and the domain it ranges over.
#[derive(Debug)]
pub(super) struct VarSlot<'a> {
    pub name: &'a str,
    pub domain: &'a ConstantDomain,
}

/// Result of grounding one substitution against the evidence.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    /// Some literal is true under the evidence, or the clause is a tautology.
    Satisfied,
    /// A variable constraint failed or a function was undefined.
    Skipped,
    /// The remaining unknown literals, sorted by atom. Empty when every
    /// literal was contradicted by the evidence.
    Clause(Vec<GroundLiteral>),
}

/// A clause resolved for substitution enumeration.
#[derive(Debug)]
pub(super) struct CompiledClause<'a> {
    pub clause: &'a WeightedClause,
    pub vars: Vec<VarSlot<'a>>,
    literals: Vec<CompiledLiteral<'a>>,
    constraints: Vec<CompiledConstraint<'a>>,
}

impl<'a> CompiledClause<'a> {
    /// Number of substitutions (product of the variable domain sizes).
    pub fn substitutions(&self) -> CompileResult<u64> {
        self.vars.iter().try_fold(1u64, |acc, v| {
            acc.checked_mul(v.domain.len() as u64)
                .ok_or_else(|| GroundingError::MalformedClause {
                    clause: self.clause.index,
                    message: "too many substitutions to enumerate".into(),
                })
        })
    }

    /// The `n`-th substitution; the first variable varies fastest.
    pub fn binding_at(&self, mut n: u64) -> Vec<usize> {
        self.vars
            .iter()
            .map(|v| {
                let len = v.domain.len() as u64;
                let digit = n % len;
                n /= len;
                digit as usize
            })
            .collect()
    }

    /// Step to the next substitution in enumeration order.
    pub fn advance(&self, binding: &mut [usize]) {
        for (digit, var) in binding.iter_mut().zip(&self.vars) {
            *digit += 1;
            if *digit < var.domain.len() {
                return;
            }
            *digit = 0;
        }
    }

    /// Render a substitution, e.g. `{t=2, e=Walk}`.
    pub fn describe(&self, binding: &[usize]) -> String {
        let parts: Vec<String> = self
            .vars
            .iter()
            .zip(binding)
            .map(|(v, &i)| format!("{}={}", v.name, v.domain.symbol(i).unwrap_or_default()))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }

    /// Ground the clause under `binding` and simplify it with the evidence.
    pub fn ground(&self, binding: &[usize]) -> Outcome {
        for c in &self.constraints {
            let (Some(left), Some(right)) = (
                c.left.eval(binding, &self.vars),
                c.right.eval(binding, &self.vars),
            ) else {
                return Outcome::Skipped;
            };
            if left.same_constant(&right) != c.equal {
                return Outcome::Skipped;
            }
        }

        let mut literals = Vec::with_capacity(self.literals.len());
        for literal in &self.literals {
            match literal {
                CompiledLiteral::Builtin {
                    positive,
                    eval,
                    args,
                } => {
                    let Some(values) = args
                        .iter()
                        .map(|arg| arg.eval(binding, &self.vars))
                        .collect::<Option<Vec<_>>>()
                    else {
                        return Outcome::Skipped;
                    };
                    let symbols: Vec<&str> = values.iter().map(Value::as_str).collect();
                    if eval(&symbols) == *positive {
                        return Outcome::Satisfied;
                    }
                }
                CompiledLiteral::Atom { positive, db, args } => {
                    let mut indices = Vec::with_capacity(args.len());
                    for (arg, domain) in args {
                        match arg.eval(binding, &self.vars).and_then(|v| v.index_in(domain)) {
                            Some(i) => indices.push(i),
                            None => return Outcome::Skipped,
                        }
                    }
                    let Some(id) = db.identity().encode_indices(&indices) else {
                        return Outcome::Skipped;
                    };
                    match db.get(id).known() {
                        Some(truth) if truth == *positive => return Outcome::Satisfied,
                        Some(_) => {}
                        None => literals.push(GroundLiteral::new(id, *positive)),
                    }
                }
            }
        }

        literals.sort_unstable_by_key(|l| (l.atom(), l.is_positive()));
        literals.dedup();
        if literals.windows(2).any(|w| w[0].atom() == w[1].atom()) {
            return Outcome::Satisfied;
        }
        Outcome::Clause(literals)
    }
}

/// Resolve a clause against the evidence's schema and the builtin registry.
pub(super) fn compile<'a>(
    clause: &'a WeightedClause,
    evidence: &'a Evidence,
    builtins: &BuiltinRegistry,
) -> CompileResult<CompiledClause<'a>> {
    let compiler = Compiler {
        clause,
        evidence,
        builtins,
    };
    let vars = compiler.variables()?;
    let slots: HashMap<&str, usize> = vars.iter().enumerate().map(|(i, v)| (v.name, i)).collect();

    let mut literals = Vec::with_capacity(clause.literals.len());
    for literal in &clause.literals {
        literals.push(compiler.literal(literal, &slots)?);
    }
    let mut constraints = Vec::with_capacity(clause.constraints.len());
    for constraint in &clause.constraints {
        let (equal, left, right) = match constraint {
            VarConstraint::Equal(a, b) => (true, a, b),
            VarConstraint::NotEqual(a, b) => (false, a, b),
        };
        constraints.push(CompiledConstraint {
            equal,
            left: compiler.term(left, None, &slots)?,
            right: compiler.term(right, None, &slots)?,
        });
    }

    Ok(CompiledClause {
        clause,
        vars,
        literals,
        constraints,
    })
}

struct Compiler<'a, 'b> {
    clause: &'a WeightedClause,
    evidence: &'a Evidence,
    builtins: &'b BuiltinRegistry,
}

impl<'a> Compiler<'a, '_> {
    fn malformed(&self, message: String) -> GroundingError {
        GroundingError::MalformedClause {
            clause: self.clause.index,
            message,
        }
    }

    fn domain(&self, name: &str) -> CompileResult<&'a ConstantDomain> {
        self.evidence
            .encoder()
            .domains()
            .get(name)
            .ok_or_else(|| self.malformed(format!("unknown domain \"{name}\"")))
    }

    /// Domains of the variables: explicit annotations first, then the
    /// argument positions each variable occurs in.
    fn variables(&self) -> CompileResult<Vec<VarSlot<'a>>> {
        let mut types: HashMap<&'a str, &'a str> = HashMap::new();
        let declared = self.clause.variables();
        for var in &declared {
            if let Some(domain) = var.domain.as_deref() {
                types.insert(var.name.as_str(), domain);
            }
        }

        let encoder = self.evidence.encoder();
        for literal in &self.clause.literals {
            let atom = &literal.atom;
            let positions: Vec<Option<&'a str>> = match encoder.identity(&atom.signature()) {
                Ok(identity) => identity.domains().iter().map(|d| Some(d.as_str())).collect(),
                Err(_) => vec![None; atom.args.len()],
            };
            for (arg, expected) in atom.args.iter().zip(positions) {
                self.infer(arg, expected, &mut types)?;
            }
        }
        for constraint in &self.clause.constraints {
            let (VarConstraint::Equal(a, b) | VarConstraint::NotEqual(a, b)) = constraint;
            self.infer(a, None, &mut types)?;
            self.infer(b, None, &mut types)?;
        }

        declared
            .into_iter()
            .map(|var| {
                let name = var.name.as_str();
                let domain = types.get(name).ok_or_else(|| GroundingError::MissingDomain {
                    clause: self.clause.index,
                    variable: name.to_string(),
                })?;
                Ok(VarSlot {
                    name,
                    domain: self.domain(domain)?,
                })
            })
            .collect()
    }

    fn infer(
        &self,
        term: &'a Term,
        expected: Option<&'a str>,
        types: &mut HashMap<&'a str, &'a str>,
    ) -> CompileResult<()> {
        match term {
            Term::Constant(_) => Ok(()),
            Term::Variable(var) => {
                let Some(domain) = expected else {
                    return Ok(());
                };
                match types.get(var.name.as_str()) {
                    Some(&first) if first != domain => Err(GroundingError::ConflictingDomains {
                        clause: self.clause.index,
                        variable: var.name.clone(),
                        first: first.to_string(),
                        second: domain.to_string(),
                    }),
                    Some(_) => Ok(()),
                    None => {
                        types.insert(var.name.as_str(), domain);
                        Ok(())
                    }
                }
            }
            Term::Function(func) => {
                let schema = self
                    .evidence
                    .encoder()
                    .schema()
                    .find_function(&func.symbol, func.args.len());
                for (i, arg) in func.args.iter().enumerate() {
                    let expected = schema.map(|s| s.args[i].as_str());
                    self.infer(arg, expected, types)?;
                }
                Ok(())
            }
        }
    }

    fn literal(
        &self,
        literal: &'a Literal,
        slots: &HashMap<&str, usize>,
    ) -> CompileResult<CompiledLiteral<'a>> {
        let atom = &literal.atom;
        let signature = atom.signature();
        if let Ok(db) = self.evidence.db(&signature) {
            let mut args = Vec::with_capacity(atom.args.len());
            for (arg, domain) in atom.args.iter().zip(db.identity().domains()) {
                let domain = self.domain(domain)?;
                args.push((self.term(arg, Some(domain), slots)?, domain));
            }
            return Ok(CompiledLiteral::Atom {
                positive: literal.positive,
                db,
                args,
            });
        }
        if let Some(eval) = self.builtins.predicate(&atom.predicate, atom.args.len()) {
            let args = atom
                .args
                .iter()
                .map(|arg| self.term(arg, None, slots))
                .collect::<CompileResult<Vec<_>>>()?;
            return Ok(CompiledLiteral::Builtin {
                positive: literal.positive,
                eval,
                args,
            });
        }
        Err(self.malformed(format!("unknown predicate {signature}")))
    }

    fn term(
        &self,
        term: &'a Term,
        expected: Option<&'a ConstantDomain>,
        slots: &HashMap<&str, usize>,
    ) -> CompileResult<CompiledTerm<'a>> {
        match term {
            Term::Constant(symbol) => match expected {
                Some(domain) => domain
                    .index_of(symbol)
                    .map(|i| CompiledTerm::Constant(Value::Index(domain, i)))
                    .ok_or_else(|| {
                        self.malformed(format!(
                            "constant \"{symbol}\" is not in domain \"{}\"",
                            domain.name()
                        ))
                    }),
                None => Ok(CompiledTerm::Constant(Value::Text(Cow::Borrowed(symbol)))),
            },
            Term::Variable(var) => slots
                .get(var.name.as_str())
                .map(|&slot| CompiledTerm::Variable(slot))
                .ok_or_else(|| self.malformed(format!("unbound variable \"{}\"", var.name))),
            Term::Function(func) => {
                let arity = func.args.len();
                if let Some(mapper) = self.evidence.function(&func.symbol, arity) {
                    let mut args = Vec::with_capacity(arity);
                    for (arg, domain) in func.args.iter().zip(&mapper.schema().args) {
                        let domain = self.domain(domain)?;
                        args.push((self.term(arg, Some(domain), slots)?, domain));
                    }
                    return Ok(CompiledTerm::Mapped {
                        mapper,
                        args,
                        returns: self.domain(&mapper.schema().returns)?,
                    });
                }
                if let Some(eval) = self.builtins.function(&func.symbol, arity) {
                    let args = func
                        .args
                        .iter()
                        .map(|arg| self.term(arg, None, slots))
                        .collect::<CompileResult<Vec<_>>>()?;
                    return Ok(CompiledTerm::Builtin { eval, args });
                }
                Err(self.malformed(format!("unknown function {}/{arity}", func.symbol)))
            }
        }
    }
}
