//! Value membership checks.
//!
//! `validate` answers yes or no; `ensure` additionally reports where and
//! why a value failed. Both walk the expression and the value together.
//! Recursive expressions are guarded by a visited set of
//! (definition, value) pairs, so a cycle that makes no progress through the
//! value fails instead of looping.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use serde::Deserialize;

use runtype_common::{Kind, Object, Value};

use crate::compare::is_top;
use crate::error::{PathSegment, ValidationError, ValidationErrorKind};
use crate::expr::{Generic, Node, Product, TypeExpr};

/// How much of each collection the validator inspects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationMode {
    /// Check every element.
    #[default]
    Full,
    /// Check at most `max_items` pseudo-randomly chosen elements of each
    /// collection. With a `seed` the choice is reproducible.
    Sampled {
        max_items: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    pub mode: ValidationMode,
}

impl ValidateOptions {
    pub fn sampled(max_items: usize, seed: Option<u64>) -> Self {
        ValidateOptions {
            mode: ValidationMode::Sampled { max_items, seed },
        }
    }
}

/// Check `value` against `expr`, inspecting every element.
pub fn validate(expr: &TypeExpr, value: &Value) -> bool {
    Validator::default().validate(expr, value)
}

/// Like [`validate`], but report the first failure.
pub fn ensure(expr: &TypeExpr, value: &Value) -> Result<(), ValidationError> {
    Validator::default().ensure(expr, value)
}

/// A validator configured with [`ValidateOptions`]. Cheap to copy and
/// safe to share; every call carries its own state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Validator {
    options: ValidateOptions,
}

impl Validator {
    pub fn new(options: ValidateOptions) -> Self {
        Validator { options }
    }

    pub fn options(&self) -> &ValidateOptions {
        &self.options
    }

    pub fn validate(&self, expr: &TypeExpr, value: &Value) -> bool {
        Run::new(&self.options, false).check(expr, value).is_ok()
    }

    pub fn ensure(&self, expr: &TypeExpr, value: &Value) -> Result<(), ValidationError> {
        Run::new(&self.options, true)
            .check(expr, value)
            .map_err(Mismatch::into_error)
    }

    /// Check each declared field of a record. A field the object lacks is
    /// checked as `null`.
    pub fn ensure_fields(
        &self,
        fields: &[(String, TypeExpr)],
        object: &Object,
    ) -> Result<(), ValidationError> {
        for (name, expr) in fields {
            let value = object.field(name).unwrap_or(&Value::Null);
            self.ensure(expr, value)
                .map_err(|e| e.prefixed(PathSegment::Field(name.clone())))?;
        }
        Ok(())
    }
}

// ── Validation run ─────────────────────────────────────────────────────

/// A failed check. Carries a report only when the run is detailed.
struct Mismatch(Option<ValidationError>);

impl Mismatch {
    fn at(self, segment: PathSegment) -> Self {
        Mismatch(self.0.map(|e| e.prefixed(segment)))
    }

    fn into_error(self) -> ValidationError {
        self.0
            .expect("a detailed validation run always produces a report")
    }
}

type Check = Result<(), Mismatch>;

struct Run {
    detailed: bool,
    sample: Option<(usize, StdRng)>,
    visiting: FxHashSet<(usize, usize)>,
}

impl Run {
    fn new(options: &ValidateOptions, detailed: bool) -> Self {
        let sample = match options.mode {
            ValidationMode::Full => None,
            ValidationMode::Sampled { max_items, seed } => {
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_rng(&mut rand::rng()),
                };
                Some((max_items, rng))
            }
        };
        Run {
            detailed,
            sample,
            visiting: FxHashSet::default(),
        }
    }

    fn fail<F>(&self, expr: &TypeExpr, value: &Value, kind: F) -> Mismatch
    where
        F: FnOnce() -> ValidationErrorKind,
    {
        if !self.detailed {
            return Mismatch(None);
        }
        Mismatch(Some(ValidationError {
            kind: kind(),
            path: Vec::new(),
            expected: expr.to_string(),
            found: value.to_string(),
            found_kind: value.kind(),
        }))
    }

    fn check(&mut self, expr: &TypeExpr, value: &Value) -> Check {
        match expr.node() {
            Node::Any => Ok(()),
            Node::Data(d) => {
                self.check_kind(expr, value, &d.kind)?;
                match &d.predicate {
                    Some(p) if !p.test(value) => Err(self.fail(expr, value, || {
                        ValidationErrorKind::PredicateFailed {
                            predicate: p.to_string(),
                        }
                    })),
                    _ => Ok(()),
                }
            }
            Node::Phantom(k) => self.check_kind(expr, value, k),
            Node::Sum(alts) => {
                let mut attempts = Vec::new();
                for alt in alts {
                    match self.check(alt, value) {
                        Ok(()) => return Ok(()),
                        Err(Mismatch(Some(e))) => attempts.push(e),
                        Err(Mismatch(None)) => {}
                    }
                }
                Err(self.fail(expr, value, || ValidationErrorKind::NoAlternativeMatched {
                    attempts,
                }))
            }
            Node::Product(p) => self.check_product(expr, p, value),
            Node::Generic(g) => self.check_generic(expr, g, value),
            Node::Constraint(c) => {
                self.check(&c.base, value)?;
                if c.predicate.test(value) {
                    Ok(())
                } else {
                    Err(self.fail(expr, value, || ValidationErrorKind::ConstraintFailed {
                        predicate: c.predicate.to_string(),
                    }))
                }
            }
            Node::Recursive(r) => {
                let key = (r.target_id(), value as *const Value as usize);
                if !self.visiting.insert(key) {
                    return Err(self.fail(expr, value, || ValidationErrorKind::KindMismatch));
                }
                let result = self.check(&r.resolve(), value);
                self.visiting.remove(&key);
                result
            }
        }
    }

    fn check_kind(&self, expr: &TypeExpr, value: &Value, kind: &Kind) -> Check {
        if value.kind().is_subkind_of(kind) {
            Ok(())
        } else {
            Err(self.fail(expr, value, || ValidationErrorKind::KindMismatch))
        }
    }

    fn check_product(&mut self, expr: &TypeExpr, p: &Product, value: &Value) -> Check {
        let items = match value {
            Value::Tuple(items) => items,
            // A tuple-like record has no visible elements; only a shape that
            // admits anything of any length can accept it.
            Value::Object(obj)
                if obj.kind.is_subkind_of(&Kind::tuple())
                    && p.parts.is_empty()
                    && p.rest.as_ref().is_some_and(is_top) =>
            {
                return Ok(());
            }
            _ => return Err(self.fail(expr, value, || ValidationErrorKind::KindMismatch)),
        };
        let expected = p.parts.len();
        let arity_ok = if p.is_open() {
            items.len() >= expected
        } else {
            items.len() == expected
        };
        if !arity_ok {
            return Err(self.fail(expr, value, || ValidationErrorKind::ArityMismatch {
                expected,
                found: items.len(),
                open: p.is_open(),
            }));
        }
        for (i, item) in items.iter().enumerate() {
            if let Some(part) = p.part(i) {
                self.check(part, item)
                    .map_err(|m| m.at(PathSegment::Index(i)))?;
            }
        }
        Ok(())
    }

    fn check_generic(&mut self, expr: &TypeExpr, g: &Generic, value: &Value) -> Check {
        self.check_kind(expr, value, &g.base)?;
        // Parameters equivalent to `Any` accept everything; skip them.
        let param = |i: usize| g.params.get(i).filter(|p| !is_top(p));
        if let Some(items) = value.elements() {
            if let Some(elem) = param(0) {
                for i in self.indices(items.len()) {
                    self.check(elem, &items[i])
                        .map_err(|m| m.at(PathSegment::Index(i)))?;
                }
            }
            return Ok(());
        }
        match value {
            Value::Dict(entries) => {
                let (key_param, value_param) = (param(0), param(1));
                if key_param.is_none() && value_param.is_none() {
                    return Ok(());
                }
                for i in self.indices(entries.len()) {
                    let (k, v) = &entries[i];
                    if let Some(kp) = key_param {
                        self.check(kp, k)
                            .map_err(|m| m.at(PathSegment::Key(k.to_string())))?;
                    }
                    if let Some(vp) = value_param {
                        self.check(vp, v)
                            .map_err(|m| m.at(PathSegment::Value(k.to_string())))?;
                    }
                }
                Ok(())
            }
            // Nothing to look inside, so only unconstrained parameters fit.
            _ => {
                if g.params.iter().all(is_top) {
                    Ok(())
                } else {
                    Err(self.fail(expr, value, || ValidationErrorKind::KindMismatch))
                }
            }
        }
    }

    /// Positions of a collection to inspect, in ascending order.
    fn indices(&mut self, len: usize) -> Vec<usize> {
        match &mut self.sample {
            Some((max_items, rng)) if len > *max_items => {
                let mut picked = index::sample(rng, len, *max_items).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..len).collect(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
