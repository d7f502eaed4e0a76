//! Validation and annotation errors.
//!
//! A `ValidationError` pinpoints where inside a value the mismatch occurred
//! (as a path from the root) and what was expected there. Errors serialise
//! with serde so callers can forward them as structured data.

use std::fmt;

use runtype_common::Kind;
use serde::Serialize;

/// One step from a value to a nested value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PathSegment {
    /// A named field of a record.
    Field(String),
    /// A position inside a list, tuple or set.
    Index(usize),
    /// A mapping key (the key itself failed).
    Key(String),
    /// The value stored under a mapping key.
    Value(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{}", name),
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, "{{key {}}}", k),
            PathSegment::Value(k) => write!(f, "[{}]", k),
        }
    }
}

/// What kind of mismatch a validation error reports.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ValidationErrorKind {
    /// The value's runtime kind is not the expected kind or a subkind of it.
    KindMismatch,
    /// A constrained leaf's predicate rejected the value.
    PredicateFailed { predicate: String },
    /// The base of a `Constraint` matched but its predicate did not.
    ConstraintFailed { predicate: String },
    /// No alternative of a union accepted the value. `attempts` holds the
    /// per-alternative failures when they were collected.
    NoAlternativeMatched { attempts: Vec<ValidationError> },
    /// A tuple had the wrong number of elements.
    ArityMismatch {
        expected: usize,
        found: usize,
        /// The expected count is a minimum rather than exact.
        open: bool,
    },
}

/// A value did not conform to a type expression.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Path from the validated root to the offending value.
    pub path: Vec<PathSegment>,
    /// Display form of the expected type at that location.
    pub expected: String,
    /// Display form of the offending value.
    pub found: String,
    pub found_kind: Kind,
}

impl ValidationError {
    /// The path rendered as `$`, `$[1].name`, and so on.
    pub fn location(&self) -> String {
        let mut out = String::from("$");
        for seg in &self.path {
            out.push_str(&seg.to_string());
        }
        out
    }

    pub(crate) fn prefixed(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.location();
        match &self.kind {
            ValidationErrorKind::KindMismatch => write!(
                f,
                "at {}: expected {}, found {} of kind {}",
                at, self.expected, self.found, self.found_kind
            ),
            ValidationErrorKind::PredicateFailed { predicate }
            | ValidationErrorKind::ConstraintFailed { predicate } => write!(
                f,
                "at {}: {} does not satisfy `{}` (expected {})",
                at, self.found, predicate, self.expected
            ),
            ValidationErrorKind::NoAlternativeMatched { attempts } => {
                write!(
                    f,
                    "at {}: {} matches no alternative of {}",
                    at, self.found, self.expected
                )?;
                for attempt in attempts {
                    write!(f, "\n  - {}", attempt)?;
                }
                Ok(())
            }
            ValidationErrorKind::ArityMismatch {
                expected,
                found,
                open,
            } => {
                let bound = if *open { "at least " } else { "" };
                write!(
                    f,
                    "at {}: expected {}{} element(s) for {}, found {}",
                    at, bound, expected, self.expected, found
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// The annotation canonicalizer could not translate an annotation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnsupportedAnnotation {
    pub annotation: String,
    pub reason: String,
}

impl fmt::Display for UnsupportedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported type annotation `{}`: {}",
            self.annotation, self.reason
        )
    }
}

impl std::error::Error for UnsupportedAnnotation {}
