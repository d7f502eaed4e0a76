//! Shared runtime types for the runtype crates.
//!
//! - [`kind`]: nominal runtime kinds and their subkind relation
//! - [`value`]: the dynamic `Value` that types are checked against

pub mod kind;
pub mod value;

pub use kind::Kind;
pub use value::{Object, Value};
