//! Overload signatures.

use std::fmt;

use runtype_common::Value;
use runtype_typeck::{Comparator, TypeExpr, TypeOrdering, Validator};
use serde::{Serialize, Serializer};

/// The declared parameter types of one overload.
///
/// An unannotated parameter is `Any`. A variadic signature repeats `rest`
/// for every argument past `params`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<TypeExpr>,
    rest: Option<TypeExpr>,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = TypeExpr>) -> Self {
        Signature {
            params: params.into_iter().collect(),
            rest: None,
        }
    }

    pub fn variadic(params: impl IntoIterator<Item = TypeExpr>, rest: TypeExpr) -> Self {
        Signature {
            params: params.into_iter().collect(),
            rest: Some(rest),
        }
    }

    pub fn params(&self) -> &[TypeExpr] {
        &self.params
    }

    pub fn rest(&self) -> Option<&TypeExpr> {
        self.rest.as_ref()
    }

    /// Number of fixed parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    /// Whether a call with `count` arguments fits the declared shape.
    pub fn accepts_count(&self, count: usize) -> bool {
        if self.is_variadic() {
            count >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    /// The declared type for argument `index`, if any.
    pub fn param(&self, index: usize) -> Option<&TypeExpr> {
        self.params.get(index).or(self.rest.as_ref())
    }

    /// Arity check followed by validation of every argument.
    pub fn accepts(&self, args: &[Value], validator: &Validator) -> bool {
        self.accepts_count(args.len())
            && args.iter().enumerate().all(|(i, arg)| match self.param(i) {
                Some(expr) => validator.validate(expr, arg),
                None => false,
            })
    }

    /// Whether any parameter's outcome can depend on more than the observed
    /// type of its argument.
    pub fn has_predicates(&self) -> bool {
        self.params.iter().chain(self.rest.iter()).any(TypeExpr::has_predicates)
    }

    /// Whether `self` is strictly more specific than `other` for a call with
    /// `count` arguments.
    ///
    /// Every used position must be at least as specific and one strictly so.
    /// When all used positions are equal, the tails decide: a closed
    /// signature's tail is `Never`, so it beats a variadic one.
    pub fn dominates(&self, other: &Signature, count: usize, cmp: &Comparator) -> bool {
        let mut strict = false;
        for i in 0..count {
            let (Some(mine), Some(theirs)) = (self.param(i), other.param(i)) else {
                return false;
            };
            let ordering = cmp.compare(mine, theirs);
            if !ordering.is_le() {
                return false;
            }
            strict |= ordering == TypeOrdering::Less;
        }
        strict || cmp.compare(&self.tail(), &other.tail()) == TypeOrdering::Less
    }

    /// Same shape with pairwise `Equal` parameters.
    pub fn is_equivalent(&self, other: &Signature, cmp: &Comparator) -> bool {
        let equal = |a: &TypeExpr, b: &TypeExpr| cmp.compare(a, b) == TypeOrdering::Equal;
        self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| equal(a, b))
            && match (&self.rest, &other.rest) {
                (None, None) => true,
                (Some(a), Some(b)) => equal(a, b),
                _ => false,
            }
    }

    fn tail(&self) -> TypeExpr {
        self.rest.clone().unwrap_or_else(TypeExpr::never)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        if let Some(rest) = &self.rest {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "*{}", rest)?;
        }
        write!(f, ")")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A registered overload: its signature and the attached callable.
pub struct Overload<F> {
    pub signature: Signature,
    pub callable: F,
}

impl<F> fmt::Debug for Overload<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature.to_string())
            .finish_non_exhaustive()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: Vec<TypeExpr>) -> Signature {
        Signature::new(params)
    }

    #[test]
    fn arity_and_variadics() {
        let fixed = sig(vec![TypeExpr::int(), TypeExpr::str()]);
        assert!(fixed.accepts_count(2));
        assert!(!fixed.accepts_count(3));
        let var = Signature::variadic([TypeExpr::int()], TypeExpr::str());
        assert!(!var.accepts_count(0));
        assert!(var.accepts_count(1));
        assert!(var.accepts_count(4));
        assert_eq!(var.param(3), Some(&TypeExpr::str()));
    }

    #[test]
    fn accepts_validates_each_argument() {
        let v = Validator::default();
        let s = Signature::variadic([TypeExpr::str()], TypeExpr::int());
        assert!(s.accepts(&[Value::str("a"), Value::Int(1), Value::Int(2)], &v));
        assert!(!s.accepts(&[Value::str("a"), Value::Int(1), Value::Null], &v));
        assert!(!s.accepts(&[], &v));
    }

    #[test]
    fn domination_needs_a_strict_position() {
        let cmp = Comparator::default();
        let narrow = sig(vec![TypeExpr::int(), TypeExpr::int()]);
        let wide = sig(vec![TypeExpr::any(), TypeExpr::int()]);
        assert!(narrow.dominates(&wide, 2, &cmp));
        assert!(!wide.dominates(&narrow, 2, &cmp));
        assert!(!narrow.dominates(&narrow.clone(), 2, &cmp));
    }

    #[test]
    fn closed_beats_variadic_on_a_tie() {
        let cmp = Comparator::default();
        let closed = sig(vec![TypeExpr::int()]);
        let open = Signature::variadic([TypeExpr::int()], TypeExpr::any());
        assert!(closed.dominates(&open, 1, &cmp));
        assert!(!open.dominates(&closed, 1, &cmp));
    }

    #[test]
    fn used_positions_outrank_tails() {
        let cmp = Comparator::default();
        let open = Signature::variadic([TypeExpr::int()], TypeExpr::int());
        let wide = sig(vec![TypeExpr::any()]);
        assert!(open.dominates(&wide, 1, &cmp));
        assert!(!wide.dominates(&open, 1, &cmp));
    }

    #[test]
    fn equivalence_is_structural_modulo_order() {
        let cmp = Comparator::default();
        let a = sig(vec![TypeExpr::sum([TypeExpr::int(), TypeExpr::str()])]);
        let b = sig(vec![TypeExpr::sum([TypeExpr::str(), TypeExpr::int()])]);
        assert!(a.is_equivalent(&b, &cmp));
        assert!(!a.is_equivalent(&Signature::variadic([TypeExpr::int()], TypeExpr::int()), &cmp));
    }

    #[test]
    fn display() {
        assert_eq!(
            Signature::variadic([TypeExpr::int()], TypeExpr::str()).to_string(),
            "(int, *str)"
        );
        assert_eq!(sig(vec![]).to_string(), "()");
    }
}
