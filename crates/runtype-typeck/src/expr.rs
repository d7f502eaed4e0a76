//! Type expression representation.
//!
//! Defines the immutable `TypeExpr` tree and its closed set of node kinds:
//! `Any`, `Data`, `Phantom`, `Sum`, `Product`, `Generic`, `Constraint`, plus
//! `Recursive` back-references for self-referential definitions. Expressions
//! are reference-counted and freely shared across threads.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use runtype_common::{Kind, Value};
use rustc_hash::FxHasher;
use serde::{Serialize, Serializer};

use crate::predicate::Predicate;

/// An immutable, shareable type expression.
///
/// Equality and hashing are structural. Two separately built expressions
/// with the same shape are equal, which is what lets them key caches.
#[derive(Clone)]
pub struct TypeExpr(Arc<Node>);

/// The node kinds a `TypeExpr` is built from.
///
/// Equality treats `Sum` alternatives as a set: order and repeats are
/// ignored.
#[derive(Clone)]
pub enum Node {
    /// Matches every value; the top of the subtype order.
    Any,
    /// A leaf matched by runtime kind and an optional predicate.
    Data(DataType),
    /// A marker leaf compared by kind identity only.
    Phantom(Kind),
    /// A union. An empty union is the bottom type.
    Sum(Vec<TypeExpr>),
    /// A fixed-arity tuple shape, optionally open-ended.
    Product(Product),
    /// A parameterized container kind such as `list[int]`.
    Generic(Generic),
    /// `base` narrowed by a value-level predicate.
    Constraint(Constraint),
    /// A back-reference to an enclosing recursive definition.
    Recursive(RecursiveRef),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    pub kind: Kind,
    pub predicate: Option<Predicate>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Product {
    pub parts: Vec<TypeExpr>,
    /// Element type repeated after `parts`; `None` for a closed product.
    pub rest: Option<TypeExpr>,
}

impl Product {
    /// The element type expected at `index`, if the product admits it.
    pub fn part(&self, index: usize) -> Option<&TypeExpr> {
        self.parts.get(index).or(self.rest.as_ref())
    }

    pub fn is_open(&self) -> bool {
        self.rest.is_some()
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Generic {
    pub base: Kind,
    /// Element parameters; for mappings, key then value.
    pub params: Vec<TypeExpr>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub base: TypeExpr,
    pub predicate: Predicate,
}

/// A named, weak reference to the recursive definition it appears in.
#[derive(Clone)]
pub struct RecursiveRef {
    name: Arc<str>,
    target: Weak<Node>,
}

impl RecursiveRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The definition this reference points back to.
    ///
    /// # Panics
    ///
    /// Panics if the defining expression has been dropped, or if called while
    /// the definition is still being built.
    pub fn resolve(&self) -> TypeExpr {
        let node = self.target.upgrade().unwrap_or_else(|| {
            panic!(
                "recursive type `{}` used outside the lifetime of its definition",
                self.name
            )
        });
        TypeExpr(node)
    }

    /// Identity of the referenced definition.
    pub fn target_id(&self) -> usize {
        self.target.as_ptr() as usize
    }
}

impl PartialEq for RecursiveRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }
}

impl Eq for RecursiveRef {}

impl Hash for RecursiveRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target_id().hash(state);
    }
}

// ── Construction ───────────────────────────────────────────────────────

struct Leaves {
    any: TypeExpr,
    never: TypeExpr,
    null: TypeExpr,
    bool: TypeExpr,
    int: TypeExpr,
    float: TypeExpr,
    str: TypeExpr,
    bytes: TypeExpr,
    object: TypeExpr,
}

static LEAVES: OnceLock<Leaves> = OnceLock::new();

fn leaves() -> &'static Leaves {
    LEAVES.get_or_init(|| Leaves {
        any: TypeExpr::new(Node::Any),
        never: TypeExpr::new(Node::Sum(Vec::new())),
        null: TypeExpr::fresh_data(Kind::null()),
        bool: TypeExpr::fresh_data(Kind::bool()),
        int: TypeExpr::fresh_data(Kind::int()),
        float: TypeExpr::fresh_data(Kind::float()),
        str: TypeExpr::fresh_data(Kind::str()),
        bytes: TypeExpr::fresh_data(Kind::bytes()),
        object: TypeExpr::fresh_data(Kind::object()),
    })
}

impl TypeExpr {
    /// Wrap a node as-is, without any normalisation.
    pub fn new(node: Node) -> Self {
        TypeExpr(Arc::new(node))
    }

    fn fresh_data(kind: Kind) -> Self {
        TypeExpr::new(Node::Data(DataType {
            kind,
            predicate: None,
        }))
    }

    pub fn any() -> Self {
        leaves().any.clone()
    }

    /// The empty union: no value belongs to it.
    pub fn never() -> Self {
        leaves().never.clone()
    }

    pub fn null() -> Self {
        leaves().null.clone()
    }

    pub fn bool() -> Self {
        leaves().bool.clone()
    }

    pub fn int() -> Self {
        leaves().int.clone()
    }

    pub fn float() -> Self {
        leaves().float.clone()
    }

    pub fn str() -> Self {
        leaves().str.clone()
    }

    pub fn bytes() -> Self {
        leaves().bytes.clone()
    }

    pub fn object() -> Self {
        leaves().object.clone()
    }

    /// A leaf matching values whose kind is `kind` or a subkind of it.
    pub fn data(kind: Kind) -> Self {
        let shared = leaves();
        for leaf in [
            &shared.null,
            &shared.bool,
            &shared.int,
            &shared.float,
            &shared.str,
            &shared.bytes,
            &shared.object,
        ] {
            if let Node::Data(d) = leaf.node() {
                if d.kind == kind {
                    return leaf.clone();
                }
            }
        }
        TypeExpr::fresh_data(kind)
    }

    /// A leaf whose values must also satisfy `predicate`.
    pub fn constrained_data(kind: Kind, predicate: Predicate) -> Self {
        TypeExpr::new(Node::Data(DataType {
            kind,
            predicate: Some(predicate),
        }))
    }

    pub fn phantom(marker: Kind) -> Self {
        TypeExpr::new(Node::Phantom(marker))
    }

    /// A normalised union: nested unions are flattened, `Any` absorbs the
    /// whole union, identical alternatives are dropped and a single
    /// remaining alternative is returned on its own.
    pub fn sum(alternatives: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for alt in alternatives {
            match alt.node() {
                Node::Any => return TypeExpr::any(),
                Node::Sum(inner) => {
                    for t in inner {
                        if t.is_any() {
                            return TypeExpr::any();
                        }
                        if !flat.contains(t) {
                            flat.push(t.clone());
                        }
                    }
                }
                _ => {
                    if !flat.contains(&alt) {
                        flat.push(alt);
                    }
                }
            }
        }
        if flat.len() == 1 {
            return flat.pop().unwrap_or_else(TypeExpr::never);
        }
        TypeExpr::new(Node::Sum(flat))
    }

    /// `Union[inner, None]`.
    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::sum([inner, TypeExpr::null()])
    }

    /// A closed tuple shape.
    pub fn product(parts: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::new(Node::Product(Product {
            parts: parts.into_iter().collect(),
            rest: None,
        }))
    }

    /// A tuple shape whose last element type `rest` repeats indefinitely.
    pub fn open_product(parts: impl IntoIterator<Item = TypeExpr>, rest: TypeExpr) -> Self {
        TypeExpr::new(Node::Product(Product {
            parts: parts.into_iter().collect(),
            rest: Some(rest),
        }))
    }

    pub fn generic(base: Kind, params: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::new(Node::Generic(Generic {
            base,
            params: params.into_iter().collect(),
        }))
    }

    pub fn list(element: TypeExpr) -> Self {
        TypeExpr::generic(Kind::list(), [element])
    }

    pub fn set(element: TypeExpr) -> Self {
        TypeExpr::generic(Kind::set(), [element])
    }

    pub fn sequence(element: TypeExpr) -> Self {
        TypeExpr::generic(Kind::sequence(), [element])
    }

    pub fn dict(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::generic(Kind::dict(), [key, value])
    }

    pub fn mapping(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::generic(Kind::mapping(), [key, value])
    }

    pub fn constraint(base: TypeExpr, predicate: Predicate) -> Self {
        TypeExpr::new(Node::Constraint(Constraint { base, predicate }))
    }

    /// Integers within `[min, max]`.
    pub fn int_range(min: Option<i64>, max: Option<i64>) -> Self {
        TypeExpr::constraint(TypeExpr::int(), Predicate::int_range(min, max))
    }

    /// Strings whose length is within `[min, max]`.
    pub fn str_length(min: Option<usize>, max: Option<usize>) -> Self {
        TypeExpr::constraint(TypeExpr::str(), Predicate::length(min, max))
    }

    /// Exactly the given values, over the union of their kinds.
    pub fn literal(values: Vec<Value>) -> Self {
        let base = TypeExpr::sum(values.iter().map(|v| TypeExpr::data(v.kind())));
        TypeExpr::constraint(base, Predicate::one_of(values))
    }

    /// Build a self-referential expression. `build` receives a reference to
    /// the definition being built and returns its body.
    ///
    /// The reference inside the body is weak: it is valid for as long as the
    /// returned expression (or a clone of it) is alive, and must not be
    /// validated or compared inside `build`.
    pub fn recursive<F>(name: &str, build: F) -> Self
    where
        F: FnOnce(TypeExpr) -> TypeExpr,
    {
        let name: Arc<str> = Arc::from(name);
        let node = Arc::new_cyclic(|weak| {
            let this = TypeExpr::new(Node::Recursive(RecursiveRef {
                name: name.clone(),
                target: weak.clone(),
            }));
            let body = build(this);
            Arc::try_unwrap(body.0).unwrap_or_else(|shared| (*shared).clone())
        });
        TypeExpr(node)
    }

    // ── Inspection ─────────────────────────────────────────────────────

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        matches!(*self.0, Node::Any)
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &TypeExpr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared node, used as an identity key.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Whether the outcome of validating against this expression can
    /// depend on anything beyond the observed type of the value.
    pub fn has_predicates(&self) -> bool {
        let mut seen = Vec::new();
        self.has_predicates_inner(&mut seen)
    }

    fn has_predicates_inner(&self, seen: &mut Vec<usize>) -> bool {
        match self.node() {
            Node::Any | Node::Phantom(_) => false,
            Node::Data(d) => d.predicate.is_some(),
            Node::Constraint(_) => true,
            Node::Sum(alts) => alts.iter().any(|t| t.has_predicates_inner(seen)),
            Node::Product(p) => {
                p.parts.iter().any(|t| t.has_predicates_inner(seen))
                    || p.rest.as_ref().is_some_and(|t| t.has_predicates_inner(seen))
            }
            Node::Generic(g) => g.params.iter().any(|t| t.has_predicates_inner(seen)),
            Node::Recursive(r) => {
                if seen.contains(&r.target_id()) {
                    return false;
                }
                seen.push(r.target_id());
                r.resolve().has_predicates_inner(seen)
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Any, Node::Any) => true,
            (Node::Data(a), Node::Data(b)) => a == b,
            (Node::Phantom(a), Node::Phantom(b)) => a == b,
            (Node::Sum(a), Node::Sum(b)) => {
                a.iter().all(|t| b.contains(t)) && b.iter().all(|t| a.contains(t))
            }
            (Node::Product(a), Node::Product(b)) => a == b,
            (Node::Generic(a), Node::Generic(b)) => a == b,
            (Node::Constraint(a), Node::Constraint(b)) => a == b,
            (Node::Recursive(a), Node::Recursive(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Node::Any => {}
            Node::Data(d) => d.hash(state),
            Node::Phantom(k) => k.hash(state),
            Node::Sum(alts) => {
                // Order-free: the distinct alternative hashes, sorted.
                let mut hashes: Vec<u64> = alts
                    .iter()
                    .map(|t| {
                        let mut h = FxHasher::default();
                        t.hash(&mut h);
                        h.finish()
                    })
                    .collect();
                hashes.sort_unstable();
                hashes.dedup();
                hashes.hash(state);
            }
            Node::Product(p) => p.hash(state),
            Node::Generic(g) => g.hash(state),
            Node::Constraint(c) => c.hash(state),
            Node::Recursive(r) => r.hash(state),
        }
    }
}

impl PartialEq for TypeExpr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for TypeExpr {}

impl Hash for TypeExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<Node> for TypeExpr {
    fn from(node: Node) -> Self {
        TypeExpr::new(node)
    }
}

// ── Display ────────────────────────────────────────────────────────────

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeExpr]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Any => write!(f, "Any"),
            Node::Data(d) => match &d.predicate {
                Some(p) => write!(f, "{} where {}", d.kind, p),
                None => write!(f, "{}", d.kind),
            },
            Node::Phantom(k) => write!(f, "Phantom[{}]", k),
            Node::Sum(alts) if alts.is_empty() => write!(f, "Never"),
            Node::Sum(alts) => {
                write!(f, "Union[")?;
                write_list(f, alts)?;
                write!(f, "]")
            }
            Node::Product(p) => {
                write!(f, "Tuple[")?;
                write_list(f, &p.parts)?;
                if let Some(rest) = &p.rest {
                    if !p.parts.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "*{}", rest)?;
                }
                write!(f, "]")
            }
            Node::Generic(g) => {
                write!(f, "{}", g.base)?;
                if !g.params.is_empty() {
                    write!(f, "[")?;
                    write_list(f, &g.params)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            Node::Constraint(c) => match c.base.node() {
                Node::Sum(_) | Node::Constraint(_) => {
                    write!(f, "({}) where {}", c.base, c.predicate)
                }
                _ => write!(f, "{} where {}", c.base, c.predicate),
            },
            Node::Recursive(r) => write!(f, "{}", r.name),
        }
    }
}

impl fmt::Debug for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeExpr({})", self)
    }
}

/// Expressions serialise as their display form.
impl Serialize for TypeExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
