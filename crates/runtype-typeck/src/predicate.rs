//! Side predicates attached to constrained leaves and `Constraint` nodes.
//!
//! A predicate is tested against a value during validation. For the
//! comparator, predicates only know "strictly implies" through identity,
//! through the built-in range/length/one-of rules, or through implications
//! the author declared explicitly. Nothing is inferred from opaque closures.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use runtype_common::Value;

type TestFn = dyn Fn(&Value) -> bool + Send + Sync;

/// A shared, immutable value-level predicate.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateData>);

struct PredicateData {
    rule: Rule,
    /// Predicates this one was declared to imply.
    implies: Vec<Predicate>,
}

enum Rule {
    /// Inclusive numeric bounds.
    Range { min: Option<Number>, max: Option<Number> },
    /// Inclusive length bounds.
    Length { min: Option<usize>, max: Option<usize> },
    OneOf(Vec<Value>),
    Custom { name: String, test: Box<TestFn> },
}

impl Predicate {
    fn from_rule(rule: Rule, implies: Vec<Predicate>) -> Self {
        Predicate(Arc::new(PredicateData { rule, implies }))
    }

    /// Numbers within `[min, max]`; either bound may be open.
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        let (min, max) = (min.map(Number::Float), max.map(Number::Float));
        Self::from_rule(Rule::Range { min, max }, Vec::new())
    }

    /// Like [`Predicate::range`] with exact integer bounds.
    pub fn int_range(min: Option<i64>, max: Option<i64>) -> Self {
        let (min, max) = (min.map(Number::Int), max.map(Number::Int));
        Self::from_rule(Rule::Range { min, max }, Vec::new())
    }

    /// Strings, bytes and collections whose length is within `[min, max]`.
    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::from_rule(Rule::Length { min, max }, Vec::new())
    }

    /// Values equal to one of `values`.
    pub fn one_of(values: Vec<Value>) -> Self {
        Self::from_rule(Rule::OneOf(values), Vec::new())
    }

    /// An opaque predicate. It implies only itself.
    pub fn custom<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::custom_implying(name, Vec::new(), test)
    }

    /// An opaque predicate whose author declares that it implies each of
    /// `implies` (every value passing it also passes them).
    pub fn custom_implying<F>(name: impl Into<String>, implies: Vec<Predicate>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::from_rule(
            Rule::Custom {
                name: name.into(),
                test: Box::new(test),
            },
            implies,
        )
    }

    pub fn test(&self, value: &Value) -> bool {
        match &self.0.rule {
            Rule::Range { min, max } => match Number::of(value) {
                Some(x) => lower_within(Some(x), *min) && upper_within(Some(x), *max),
                None => false,
            },
            Rule::Length { min, max } => match value.len() {
                Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
                None => false,
            },
            Rule::OneOf(values) => values.contains(value),
            Rule::Custom { test, .. } => test(value),
        }
    }

    /// Whether every value passing `self` is known to pass `other`.
    pub fn implies(&self, other: &Predicate) -> bool {
        if self == other {
            return true;
        }
        let built_in = match (&self.0.rule, &other.0.rule) {
            (Rule::Range { min: a0, max: a1 }, Rule::Range { min: b0, max: b1 }) => {
                lower_within(*a0, *b0) && upper_within(*a1, *b1)
            }
            (Rule::Length { min: a0, max: a1 }, Rule::Length { min: b0, max: b1 }) => {
                lower_within(*a0, *b0) && upper_within(*a1, *b1)
            }
            (Rule::OneOf(values), rule) if !matches!(rule, Rule::Custom { .. }) => {
                values.iter().all(|v| other.test(v))
            }
            _ => false,
        };
        built_in || self.0.implies.iter().any(|p| p.implies(other))
    }
}

/// An integer or float, ordered exactly across the two.
#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    /// Identity for equality and hashing: `1` and `1.0` are distinct bounds.
    fn key(self) -> (u8, u64) {
        match self {
            Number::Int(i) => (0, i as u64),
            Number::Float(x) => (1, x.to_bits()),
        }
    }
}

/// Compare an integer with a float without rounding either.
fn cmp_int_float(i: i64, x: f64) -> Option<Ordering> {
    // 2^63 is exactly representable; every i64 lies in [-2^63, 2^63).
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if x.is_nan() {
        return None;
    }
    if x >= LIMIT {
        return Some(Ordering::Less);
    }
    if x < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = x.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(x - whole)),
        unequal => Some(unequal),
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
            (Number::Int(a), Number::Float(b)) => cmp_int_float(a, b),
            (Number::Float(a), Number::Int(b)) => cmp_int_float(b, a).map(Ordering::reverse),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

fn lower_within<T: PartialOrd>(inner: Option<T>, outer: Option<T>) -> bool {
    match (inner, outer) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(i), Some(o)) => i >= o,
    }
}

fn upper_within<T: PartialOrd>(inner: Option<T>, outer: Option<T>) -> bool {
    match (inner, outer) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(i), Some(o)) => i <= o,
    }
}

/// Built-in predicates compare by value, custom ones by identity.
impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&self.0.rule, &other.0.rule) {
            (Rule::Range { min: a0, max: a1 }, Rule::Range { min: b0, max: b1 }) => {
                key(*a0) == key(*b0) && key(*a1) == key(*b1)
            }
            (Rule::Length { min: a0, max: a1 }, Rule::Length { min: b0, max: b1 }) => {
                a0 == b0 && a1 == b1
            }
            (Rule::OneOf(a), Rule::OneOf(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0.rule {
            Rule::Range { min, max } => {
                0u8.hash(state);
                key(*min).hash(state);
                key(*max).hash(state);
            }
            Rule::Length { min, max } => {
                1u8.hash(state);
                min.hash(state);
                max.hash(state);
            }
            // Values hold floats; the length keeps equal lists together.
            Rule::OneOf(values) => {
                2u8.hash(state);
                values.len().hash(state);
            }
            Rule::Custom { .. } => {
                3u8.hash(state);
                (Arc::as_ptr(&self.0) as usize).hash(state);
            }
        }
    }
}

fn key(bound: Option<Number>) -> Option<(u8, u64)> {
    bound.map(Number::key)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.rule {
            Rule::Range { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "{} <= x <= {}", lo, hi),
                (Some(lo), None) => write!(f, "x >= {}", lo),
                (None, Some(hi)) => write!(f, "x <= {}", hi),
                (None, None) => write!(f, "x is a number"),
            },
            Rule::Length { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "{} <= len <= {}", lo, hi),
                (Some(lo), None) => write!(f, "len >= {}", lo),
                (None, Some(hi)) => write!(f, "len <= {}", hi),
                (None, None) => write!(f, "has a length"),
            },
            Rule::OneOf(values) => {
                write!(f, "x in [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Rule::Custom { name, .. } => write!(f, "{}", name),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
