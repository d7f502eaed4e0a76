//! Multiple dispatch over run-time type expressions.
//!
//! A [`DispatchGroup`] maps function names to overloads, each a
//! [`Signature`] of parameter types plus a callable. Resolving a call keeps
//! the overloads whose parameters validate the arguments, then picks the
//! one that is at least as specific as every other survivor at every
//! position and strictly more specific at one. If no survivor dominates
//! the rest the call is [`DispatchError::Ambiguous`]; registration order
//! never decides.
//!
//! # Architecture
//!
//! - [`signature`]: parameter tuples, arity and specificity between them
//! - `resolve`: the filter-and-rank pass
//! - `cache`: outcomes memoized by observed argument types
//! - [`group`]: registration, locking and statistics
//!
//! ```
//! use runtype_common::Value;
//! use runtype_dispatch::{DispatchGroup, Signature};
//! use runtype_typeck::TypeExpr;
//!
//! let group: DispatchGroup<fn(&[Value]) -> &'static str> = DispatchGroup::new();
//! group
//!     .register("describe", Signature::new([TypeExpr::any()]), |_| "something")
//!     .unwrap();
//! group
//!     .register("describe", Signature::new([TypeExpr::int()]), |_| "an int")
//!     .unwrap();
//! assert_eq!(group.call("describe", &[Value::Int(3)]).unwrap(), "an int");
//! assert_eq!(group.call("describe", &[Value::Null]).unwrap(), "something");
//! ```

mod cache;
pub mod error;
pub mod group;
mod resolve;
pub mod signature;

pub use error::DispatchError;
pub use group::{DispatchGroup, DispatchOptions, DispatchStats, DEFAULT_CACHE_CAPACITY};
pub use signature::{Overload, Signature};
