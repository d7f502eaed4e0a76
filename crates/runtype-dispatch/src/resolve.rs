//! Overload resolution: filter by validation, then rank by specificity.
//!
//! A candidate wins only if it dominates every other survivor. When no
//! survivor does, the call is ambiguous and the undominated survivors are
//! reported. Registration order never breaks a tie.

use std::sync::Arc;

use tracing::debug;

use runtype_common::Value;
use runtype_typeck::{observed_type, Comparator, Validator};

use crate::error::DispatchError;
use crate::signature::Overload;

pub(crate) type Outcome<F> = Result<Arc<Overload<F>>, DispatchError>;

/// Select the most specific overload accepting `args`.
pub(crate) fn resolve_overload<F>(
    name: &str,
    overloads: &[Arc<Overload<F>>],
    args: &[Value],
    validator: &Validator,
    cmp: &Comparator,
) -> Outcome<F> {
    let survivors: Vec<&Arc<Overload<F>>> = overloads
        .iter()
        .filter(|o| o.signature.accepts(args, validator))
        .collect();

    match survivors.as_slice() {
        [] => {
            return Err(DispatchError::NoMatch {
                name: name.to_string(),
                arg_types: args.iter().map(observed_type).collect(),
            })
        }
        [only] => return Ok(Arc::clone(only)),
        _ => {}
    }

    let count = args.len();
    let beats = |a: &Arc<Overload<F>>, b: &Arc<Overload<F>>| {
        a.signature.dominates(&b.signature, count, cmp)
    };

    let mut winners = survivors.iter().copied().filter(|&s| {
        survivors
            .iter()
            .copied()
            .all(|o| Arc::ptr_eq(s, o) || beats(s, o))
    });
    if let (Some(winner), None) = (winners.next(), winners.next()) {
        return Ok(Arc::clone(winner));
    }

    let mut candidates: Vec<_> = survivors
        .iter()
        .copied()
        .filter(|&s| {
            !survivors
                .iter()
                .copied()
                .any(|o| !Arc::ptr_eq(s, o) && beats(o, s))
        })
        .map(|s| s.signature.clone())
        .collect();
    candidates.sort_by_cached_key(|s| s.to_string());

    debug!(
        name,
        survivors = survivors.len(),
        candidates = candidates.len(),
        "ambiguous call"
    );
    Err(DispatchError::Ambiguous {
        name: name.to_string(),
        arg_types: args.iter().map(observed_type).collect(),
        candidates,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────
