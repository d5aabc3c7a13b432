//! Builtin registry: evaluable predicates and functions.
//!
//! Builtin atoms such as `lessThan(t1, t2)` and functions such as `succ(t)`
//! are not random variables: the grounding engine evaluates them directly on
//! the substituted constants. The [`BuiltinRegistry`] is an explicit table
//! populated at configuration time; [`BuiltinRegistry::standard`] holds the
//! stock entries and callers may register more.

use std::collections::HashMap;

/// Evaluates a builtin predicate on constant symbols.
pub type PredicateFn = fn(&[&str]) -> bool;

/// Evaluates a builtin function on constant symbols. `None` means undefined.
pub type FunctionFn = fn(&[&str]) -> Option<String>;

/// Table of builtin predicates and functions keyed by `(symbol, arity)`.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    predicates: HashMap<(String, usize), PredicateFn>,
    functions: HashMap<(String, usize), FunctionFn>,
}

impl BuiltinRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock builtins.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_predicate("equals", 2, |a| a[0] == a[1]);
        registry.register_predicate("notEquals", 2, |a| a[0] != a[1]);
        registry.register_predicate("lessThan", 2, |a| compare(a[0], a[1]).is_lt());
        registry.register_predicate("lessThanEq", 2, |a| compare(a[0], a[1]).is_le());
        registry.register_predicate("greaterThan", 2, |a| compare(a[0], a[1]).is_gt());
        registry.register_predicate("greaterThanEq", 2, |a| compare(a[0], a[1]).is_ge());
        registry.register_predicate("substr", 2, |a| a[1].contains(a[0]));

        registry.register_function("succ", 1, |a| int(a[0])?.checked_add(1).map(|v| v.to_string()));
        registry.register_function("prec", 1, |a| int(a[0])?.checked_sub(1).map(|v| v.to_string()));
        registry.register_function("plus", 2, |a| int(a[0])?.checked_add(int(a[1])?).map(|v| v.to_string()));
        registry.register_function("minus", 2, |a| int(a[0])?.checked_sub(int(a[1])?).map(|v| v.to_string()));
        registry.register_function("times", 2, |a| int(a[0])?.checked_mul(int(a[1])?).map(|v| v.to_string()));
        registry.register_function("dividedBy", 2, |a| int(a[0])?.checked_div(int(a[1])?).map(|v| v.to_string()));
        registry.register_function("mod", 2, |a| int(a[0])?.checked_rem(int(a[1])?).map(|v| v.to_string()));
        registry.register_function("concat", 2, |a| Some(format!("{}{}", a[0], a[1])));
        registry
    }

    /// Register (or replace) a builtin predicate.
    pub fn register_predicate(&mut self, symbol: &str, arity: usize, eval: PredicateFn) {
        self.predicates.insert((symbol.to_string(), arity), eval);
    }

    /// Register (or replace) a builtin function.
    pub fn register_function(&mut self, symbol: &str, arity: usize, eval: FunctionFn) {
        self.functions.insert((symbol.to_string(), arity), eval);
    }

    /// Look up a builtin predicate.
    pub fn predicate(&self, symbol: &str, arity: usize) -> Option<PredicateFn> {
        self.predicates.get(&(symbol.to_string(), arity)).copied()
    }

    /// Look up a builtin function.
    pub fn function(&self, symbol: &str, arity: usize) -> Option<FunctionFn> {
        self.functions.get(&(symbol.to_string(), arity)).copied()
    }

    /// Number of registered predicates and functions.
    pub fn len(&self) -> usize {
        self.predicates.len() + self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn int(s: &str) -> Option<i64> {
    s.parse().ok()
}

/// Numeric order when both sides are integers, lexicographic otherwise.
fn compare(a: &str, b: &str) -> std::cmp::Ordering {
    match (int(a), int(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_are_numeric_for_integers() {
        let r = BuiltinRegistry::standard();
        let lt = r.predicate("lessThan", 2).unwrap();
        assert!(lt(&["2", "10"]));
        assert!(!lt(&["10", "2"]));
        assert!(lt(&["apple", "banana"]));
        let ge = r.predicate("greaterThanEq", 2).unwrap();
        assert!(ge(&["3", "3"]));
    }

    #[test]
    fn arithmetic_functions() {
        let r = BuiltinRegistry::standard();
        assert_eq!(r.function("succ", 1).unwrap()(&["4"]), Some("5".into()));
        assert_eq!(r.function("prec", 1).unwrap()(&["4"]), Some("3".into()));
        assert_eq!(r.function("dividedBy", 2).unwrap()(&["4", "0"]), None);
        assert_eq!(r.function("succ", 1).unwrap()(&["x"]), None);
        assert_eq!(r.function("concat", 2).unwrap()(&["a", "b"]), Some("ab".into()));
    }

    #[test]
    fn lookups_respect_arity() {
        let r = BuiltinRegistry::standard();
        assert!(r.predicate("equals", 3).is_none());
        assert!(r.function("succ", 2).is_none());
    }

    #[test]
    fn custom_registration() {
        let mut r = BuiltinRegistry::new();
        assert!(r.is_empty());
        r.register_predicate("even", 1, |a| a[0].parse::<i64>().is_ok_and(|v| v % 2 == 0));
        let even = r.predicate("even", 1).unwrap();
        assert!(even(&["4"]));
        assert!(!even(&["3"]));
        assert_eq!(r.len(), 1);
    }
}
