//! Runtype type algebra: run-time type expressions, validation and the
//! subtype order.
//!
//! A [`TypeExpr`] describes the shape of a value. Given one, this crate
//! answers whether a concrete [`Value`](runtype_common::Value) belongs to it
//! and how two expressions relate by specificity:
//!
//! - validation in full or sampled mode, with structured failures
//! - a four-valued comparison that is a partial order
//! - observed types of values, used to key dispatch caches
//!
//! # Architecture
//!
//! - [`expr`]: Type expression nodes and constructors
//! - [`predicate`]: Value-level predicates and their implication rules
//! - [`validate`]: The validator and its options
//! - [`compare`]: The subtype comparator
//! - [`observe`]: Observed types of concrete values
//! - [`annotation`]: Annotation canonicalizer contract and a textual implementation
//! - [`error`]: Validation and annotation errors

pub mod annotation;
pub mod compare;
pub mod error;
pub mod expr;
pub mod observe;
pub mod predicate;
pub mod validate;

pub use annotation::{AnnotationCanonicalizer, Canonicalize};
pub use compare::{compare, is_subtype, is_top, Comparator, TypeOrdering};
pub use error::{PathSegment, UnsupportedAnnotation, ValidationError, ValidationErrorKind};
pub use expr::{Node, TypeExpr};
pub use observe::observed_type;
pub use predicate::Predicate;
pub use validate::{ensure, validate, ValidateOptions, ValidationMode, Validator};
