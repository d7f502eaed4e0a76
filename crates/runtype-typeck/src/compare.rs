//! The subtype order over type expressions.
//!
//! Everything is derived from a single sound check, `le(a, b)`: "every
//! value matching `a` also matches `b`". `compare` asks it in both
//! directions, so the four-way result is a partial order by construction
//! and agrees with `is_subtype` by definition. The check is deliberately
//! conservative: when it cannot prove containment (opaque predicates,
//! unresolved recursive cycles) it answers `false`, and the pair comes out
//! incomparable.

use rustc_hash::FxHashSet;
use tracing::debug;

use runtype_common::Kind;

use crate::expr::{Generic, Node, Product, TypeExpr};
use crate::predicate::Predicate;

/// Nesting depth after which a comparison gives up.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// The result of comparing two type expressions by specificity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeOrdering {
    /// The left side is strictly more specific.
    Less,
    Equal,
    /// The left side is strictly more general.
    Greater,
    Incomparable,
}

impl TypeOrdering {
    pub fn reverse(self) -> TypeOrdering {
        match self {
            TypeOrdering::Less => TypeOrdering::Greater,
            TypeOrdering::Greater => TypeOrdering::Less,
            other => other,
        }
    }

    /// `Less` or `Equal`.
    pub fn is_le(self) -> bool {
        matches!(self, TypeOrdering::Less | TypeOrdering::Equal)
    }
}

/// Compare two expressions with the default depth limit.
pub fn compare(a: &TypeExpr, b: &TypeExpr) -> TypeOrdering {
    Comparator::default().compare(a, b)
}

/// Whether `a` is a subtype of (or equal to) `b`.
pub fn is_subtype(a: &TypeExpr, b: &TypeExpr) -> bool {
    Comparator::default().is_subtype(a, b)
}

/// Whether `t` accepts every value, i.e. is equivalent to `Any`.
pub fn is_top(t: &TypeExpr) -> bool {
    Comparator::default().is_subtype(&TypeExpr::any(), t)
}

/// A configured subtype checker. Holds no state between calls.
#[derive(Clone, Copy, Debug)]
pub struct Comparator {
    max_depth: usize,
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Comparator {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Comparator { max_depth }
    }

    pub fn compare(&self, a: &TypeExpr, b: &TypeExpr) -> TypeOrdering {
        if a == b {
            return TypeOrdering::Equal;
        }
        match (self.is_subtype(a, b), self.is_subtype(b, a)) {
            (true, true) => TypeOrdering::Equal,
            (true, false) => TypeOrdering::Less,
            (false, true) => TypeOrdering::Greater,
            (false, false) => TypeOrdering::Incomparable,
        }
    }

    pub fn is_subtype(&self, a: &TypeExpr, b: &TypeExpr) -> bool {
        if a == b {
            return true;
        }
        let mut check = SubtypeCheck::new(self.max_depth);
        let result = check.le(a, b);
        if check.truncated {
            debug!(
                max_depth = self.max_depth,
                left = %a,
                right = %b,
                "subtype check hit the depth limit"
            );
        }
        result
    }
}

// ── Subtype check ──────────────────────────────────────────────────────

/// State for one `le` query: the recursion depth and the recursive
/// unfoldings currently in progress.
struct SubtypeCheck {
    depth: usize,
    max_depth: usize,
    truncated: bool,
    unfolding: FxHashSet<(bool, usize, TypeExpr)>,
}

impl SubtypeCheck {
    fn new(max_depth: usize) -> Self {
        SubtypeCheck {
            depth: 0,
            max_depth,
            truncated: false,
            unfolding: FxHashSet::default(),
        }
    }

    fn le(&mut self, a: &TypeExpr, b: &TypeExpr) -> bool {
        if a.ptr_eq(b) {
            return true;
        }
        if self.depth >= self.max_depth {
            self.truncated = true;
            return false;
        }
        self.depth += 1;
        let result = self.le_node(a, b);
        self.depth -= 1;
        result
    }

    fn le_node(&mut self, a: &TypeExpr, b: &TypeExpr) -> bool {
        if b.is_any() {
            return true;
        }
        if let Node::Recursive(r) = a.node() {
            return self.unfold(true, r.target_id(), b, |check| check.le(&r.resolve(), b));
        }
        if let Node::Sum(alts) = a.node() {
            return alts.iter().all(|alt| self.le(alt, b));
        }
        if let Node::Recursive(r) = b.node() {
            return self.unfold(false, r.target_id(), a, |check| check.le(a, &r.resolve()));
        }

        // Predicates on the right must be entailed by the left.
        match b.node() {
            Node::Constraint(c) => return self.le(a, &c.base) && self.entails(a, &c.predicate),
            Node::Data(d) => {
                if let Some(q) = &d.predicate {
                    return self.le_kind(a, &d.kind) && self.entails(a, q);
                }
            }
            _ => {}
        }

        // A constraint on the left only narrows its base.
        if let Node::Constraint(c) = a.node() {
            if self.le(&c.base, b) {
                return true;
            }
            return match b.node() {
                Node::Sum(alts) => alts.iter().any(|alt| self.le(a, alt)),
                _ => false,
            };
        }

        match b.node() {
            Node::Sum(alts) => alts.iter().any(|alt| self.le(a, alt)),
            Node::Data(d) => self.le_kind(a, &d.kind),
            Node::Phantom(k) => matches!(a.node(), Node::Phantom(m) if m == k),
            Node::Product(p) => self.le_product(a, p),
            Node::Generic(g) => self.le_generic(a, g),
            Node::Any | Node::Constraint(_) | Node::Recursive(_) => false,
        }
    }

    /// Unfold a recursive reference once. Meeting the same unfolding again
    /// means the cycle did not resolve, which counts as "not provable".
    fn unfold<F>(&mut self, on_left: bool, target: usize, other: &TypeExpr, then: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let key = (on_left, target, other.clone());
        if !self.unfolding.insert(key.clone()) {
            return false;
        }
        let result = then(self);
        self.unfolding.remove(&key);
        result
    }

    /// Every value of `a` has a runtime kind at or below `kind`.
    fn le_kind(&mut self, a: &TypeExpr, kind: &Kind) -> bool {
        match a.node() {
            Node::Any | Node::Phantom(_) => false,
            Node::Data(d) => d.kind.is_subkind_of(kind),
            Node::Sum(alts) => alts.iter().all(|alt| self.le_kind(alt, kind)),
            Node::Product(_) => Kind::tuple().is_subkind_of(kind),
            Node::Generic(g) => g.base.is_subkind_of(kind),
            Node::Constraint(c) => self.le_kind(&c.base, kind),
            Node::Recursive(_) => self.le(a, &TypeExpr::data(kind.clone())),
        }
    }

    /// Every value of `a` is known to satisfy `q`.
    fn entails(&mut self, a: &TypeExpr, q: &Predicate) -> bool {
        match a.node() {
            Node::Data(d) => d.predicate.as_ref().is_some_and(|p| p.implies(q)),
            Node::Constraint(c) => c.predicate.implies(q) || self.entails(&c.base, q),
            Node::Sum(alts) => alts.iter().all(|alt| self.entails(alt, q)),
            _ => false,
        }
    }

    fn le_product(&mut self, a: &TypeExpr, b: &Product) -> bool {
        match a.node() {
            Node::Product(ap) => {
                let n = b.parts.len();
                match (&ap.rest, &b.rest) {
                    (None, None) => ap.parts.len() == n && self.all_le(&ap.parts, &b.parts),
                    (Some(_), None) => false,
                    (None, Some(b_rest)) => {
                        ap.parts.len() >= n
                            && self.all_le(&ap.parts[..n], &b.parts)
                            && ap.parts[n..].iter().all(|x| self.le(x, b_rest))
                    }
                    (Some(a_rest), Some(b_rest)) => {
                        ap.parts.len() >= n
                            && self.all_le(&ap.parts[..n], &b.parts)
                            && ap.parts[n..].iter().all(|x| self.le(x, b_rest))
                            && self.le(a_rest, b_rest)
                    }
                }
            }
            // Any tuple at all is only contained in `Tuple[*T]` with `T` top.
            Node::Data(d) => {
                d.kind.is_subkind_of(&Kind::tuple())
                    && b.parts.is_empty()
                    && b.rest.as_ref().is_some_and(|r| self.is_top(r))
            }
            Node::Generic(g) => {
                if !g.base.is_subkind_of(&Kind::tuple()) || !b.parts.is_empty() {
                    return false;
                }
                match (&b.rest, g.params.first()) {
                    (Some(rest), Some(elem)) => self.le(elem, rest),
                    (Some(rest), None) => self.is_top(rest),
                    (None, _) => false,
                }
            }
            _ => false,
        }
    }

    fn le_generic(&mut self, a: &TypeExpr, b: &Generic) -> bool {
        match a.node() {
            Node::Data(d) => {
                d.kind.is_subkind_of(&b.base) && b.params.iter().all(|p| self.is_top(p))
            }
            // Parameters are covariant; a missing parameter stands for `Any`.
            Node::Generic(ag) => {
                ag.base.is_subkind_of(&b.base)
                    && b.params.iter().enumerate().all(|(i, bp)| match ag.params.get(i) {
                        Some(ap) => self.le(ap, bp),
                        None => self.is_top(bp),
                    })
            }
            // A tuple shape viewed as a container of its elements.
            Node::Product(ap) => {
                if !Kind::tuple().is_subkind_of(&b.base) {
                    return false;
                }
                let Some((elem, extra)) = b.params.split_first() else {
                    return true;
                };
                ap.parts.iter().all(|x| self.le(x, elem))
                    && ap.rest.as_ref().map_or(true, |r| self.le(r, elem))
                    && extra.iter().all(|p| self.is_top(p))
            }
            _ => false,
        }
    }

    fn all_le(&mut self, left: &[TypeExpr], right: &[TypeExpr]) -> bool {
        left.iter().zip(right).all(|(x, y)| self.le(x, y))
    }

    fn is_top(&mut self, t: &TypeExpr) -> bool {
        self.le(&TypeExpr::any(), t)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
