//! Observed types of concrete values.
//!
//! The observed type is the most specific predicate-free expression a
//! value is known to belong to. Dispatch keys its cache on it, so two
//! argument tuples with equal observed types always resolve the same way
//! unless an overload depends on a predicate.

use runtype_common::Value;

use crate::expr::TypeExpr;

/// Derive the observed type of `value`.
///
/// Scalars and records map to their kind's leaf, tuples to a closed product
/// of their elements, and lists, sets and dicts to the generic of their
/// kind over the union of element (or key and value) types. An empty
/// collection observes `Never` as its element type.
pub fn observed_type(value: &Value) -> TypeExpr {
    match value {
        Value::Tuple(items) => TypeExpr::product(items.iter().map(observed_type)),
        Value::List(items) => TypeExpr::list(union_of(items.iter())),
        Value::Set(items) => TypeExpr::set(union_of(items.iter())),
        Value::Dict(entries) => TypeExpr::dict(
            union_of(entries.iter().map(|(k, _)| k)),
            union_of(entries.iter().map(|(_, v)| v)),
        ),
        other => TypeExpr::data(other.kind()),
    }
}

fn union_of<'a>(values: impl Iterator<Item = &'a Value>) -> TypeExpr {
    TypeExpr::sum(values.map(observed_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare, TypeOrdering};

    #[test]
    fn scalars_observe_their_kind() {
        assert_eq!(observed_type(&Value::Int(3)), TypeExpr::int());
        assert_eq!(observed_type(&Value::str("x")), TypeExpr::str());
    }

    #[test]
    fn lists_observe_the_union_of_elements() {
        let v = Value::list([Value::Int(1), Value::str("a"), Value::Int(2)]);
        assert_eq!(
            observed_type(&v),
            TypeExpr::list(TypeExpr::sum([TypeExpr::int(), TypeExpr::str()]))
        );
    }

    #[test]
    fn tuples_observe_a_product() {
        let v = Value::tuple([Value::Int(1), Value::Null]);
        assert_eq!(
            observed_type(&v),
            TypeExpr::product([TypeExpr::int(), TypeExpr::null()])
        );
    }

    #[test]
    fn empty_list_is_below_every_list() {
        let observed = observed_type(&Value::list([]));
        assert_eq!(observed, TypeExpr::list(TypeExpr::never()));
        assert_eq!(
            compare(&observed, &TypeExpr::list(TypeExpr::str())),
            TypeOrdering::Less
        );
    }
}
