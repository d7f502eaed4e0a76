//! Integration tests for overload resolution.

use runtype_common::{Kind, Value};
use runtype_dispatch::{DispatchError, DispatchGroup, Signature};
use runtype_typeck::{Predicate, TypeExpr};

// ── Helpers ────────────────────────────────────────────────────────────

type Labelled = DispatchGroup<&'static str>;

fn sig(params: impl IntoIterator<Item = TypeExpr>) -> Signature {
    Signature::new(params)
}

fn int_or_str() -> TypeExpr {
    TypeExpr::sum([TypeExpr::int(), TypeExpr::str()])
}

fn winner(group: &Labelled, name: &str, args: &[Value]) -> &'static str {
    group.resolve(name, args).unwrap().callable
}

fn candidates(err: DispatchError) -> Vec<String> {
    match err {
        DispatchError::Ambiguous { candidates, .. } => {
            candidates.iter().map(|c| c.to_string()).collect()
        }
        other => panic!("expected an ambiguous call, got {}", other),
    }
}

// ── Ranking ────────────────────────────────────────────────────────────

/// A narrower first parameter wins when both overloads accept the call.
#[test]
fn test_more_specific_overload_wins() {
    let group = Labelled::new();
    group.register("f", sig([int_or_str(), TypeExpr::int()]), "wide").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::int()]), "narrow").unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(1), Value::Int(2)]), "narrow");
    assert_eq!(winner(&group, "f", &[Value::str("x"), Value::Int(2)]), "wide");
}

/// `f(a, b: int)` and `f(a: int, b)` cross each other on `f(1, 1)`.
#[test]
fn test_crossed_overloads_are_ambiguous() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::any(), TypeExpr::int()]), "b_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::any()]), "a_int").unwrap();

    let err = group.resolve("f", &[Value::Int(1), Value::Int(1)]).unwrap_err();
    assert_eq!(candidates(err), vec!["(Any, int)", "(int, Any)"]);

    // Filtering leaves a single survivor here.
    assert_eq!(winner(&group, "f", &[Value::Int(1), Value::str("s")]), "a_int");
}

#[test]
fn test_ambiguity_survives_a_wider_third_overload() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::any(), TypeExpr::any()]), "wide").unwrap();
    group.register("f", sig([TypeExpr::any(), TypeExpr::int()]), "b_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::any()]), "a_int").unwrap();

    let err = group.resolve("f", &[Value::Int(1), Value::Int(1)]).unwrap_err();
    assert_eq!(candidates(err), vec!["(Any, int)", "(int, Any)"]);
    assert_eq!(winner(&group, "f", &[Value::Null, Value::Null]), "wide");
}

#[test]
fn test_ambiguity_resolved_by_a_meet() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::any(), TypeExpr::int()]), "b_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::any()]), "a_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::int()]), "both").unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(1), Value::Int(1)]), "both");
}

/// Every registration order yields the same outcome.
#[test]
fn test_registration_order_does_not_matter() {
    let overloads = [
        (sig([TypeExpr::any()]), "any"),
        (sig([TypeExpr::data(Kind::number())]), "number"),
        (sig([TypeExpr::int()]), "int"),
        (sig([TypeExpr::str()]), "str"),
    ];
    let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];
    let calls = [
        (Value::Int(1), "int"),
        (Value::Float(1.5), "number"),
        (Value::str("s"), "str"),
        (Value::Null, "any"),
    ];
    for order in orders {
        let group = Labelled::new();
        for i in order {
            let (signature, label) = overloads[i].clone();
            group.register("f", signature, label).unwrap();
        }
        for (arg, expected) in &calls {
            assert_eq!(winner(&group, "f", &[arg.clone()]), *expected, "order {:?}", order);
        }
    }
}

#[test]
fn test_user_kind_hierarchy() {
    let animal = Kind::new("Animal", vec![]);
    let dog = Kind::new("Dog", vec![animal.clone()]);
    let group = Labelled::new();
    group.register("speak", sig([TypeExpr::data(animal.clone())]), "animal").unwrap();
    group.register("speak", sig([TypeExpr::data(dog.clone())]), "dog").unwrap();

    let rex = Value::Object(runtype_common::Object::new(dog, vec![]));
    let generic = Value::Object(runtype_common::Object::new(animal, vec![]));
    assert_eq!(winner(&group, "speak", &[rex]), "dog");
    assert_eq!(winner(&group, "speak", &[generic]), "animal");
}

#[test]
fn test_container_parameters() {
    let group = Labelled::new();
    group.register("sum", sig([TypeExpr::list(TypeExpr::any())]), "list").unwrap();
    group
        .register("sum", sig([TypeExpr::list(TypeExpr::int())]), "ints")
        .unwrap();

    let ints = Value::list([Value::Int(1), Value::Int(2)]);
    let mixed = Value::list([Value::Int(1), Value::str("a")]);
    assert_eq!(winner(&group, "sum", &[ints]), "ints");
    assert_eq!(winner(&group, "sum", &[mixed]), "list");
    // An empty list is a list of ints too.
    assert_eq!(winner(&group, "sum", &[Value::list([])]), "ints");
}

#[test]
fn test_constraint_is_more_specific_than_base() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::int()]), "int").unwrap();
    group
        .register("f", sig([TypeExpr::int_range(Some(0), None)]), "natural")
        .unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(4)]), "natural");
    assert_eq!(winner(&group, "f", &[Value::Int(-4)]), "int");
}

/// Ranges one apart near the top of `i64` are distinct and ordered.
#[test]
fn test_large_integer_ranges_rank_exactly() {
    let two_53 = 1i64 << 53;
    let group = Labelled::new();
    group
        .register("f", sig([TypeExpr::int_range(Some(0), Some(two_53))]), "narrow")
        .unwrap();
    group
        .register("f", sig([TypeExpr::int_range(Some(0), Some(two_53 + 1))]), "wide")
        .unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(two_53)]), "narrow");
    assert_eq!(winner(&group, "f", &[Value::Int(two_53 + 1)]), "wide");
    assert!(matches!(
        group.resolve("f", &[Value::Int(two_53 + 2)]),
        Err(DispatchError::NoMatch { .. })
    ));
}

#[test]
fn test_unrelated_predicates_are_ambiguous() {
    let even = Predicate::custom("even", |v| matches!(v, Value::Int(i) if i % 2 == 0));
    let small = Predicate::custom("small", |v| matches!(v, Value::Int(i) if *i < 10));
    let group = Labelled::new();
    group
        .register("f", sig([TypeExpr::constraint(TypeExpr::int(), even)]), "even")
        .unwrap();
    group
        .register("f", sig([TypeExpr::constraint(TypeExpr::int(), small)]), "small")
        .unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(12)]), "even");
    assert_eq!(winner(&group, "f", &[Value::Int(3)]), "small");
    assert!(matches!(
        group.resolve("f", &[Value::Int(4)]),
        Err(DispatchError::Ambiguous { .. })
    ));
}

// ── Arity ──────────────────────────────────────────────────────────────

#[test]
fn test_arity_filters_before_ranking() {
    let group = Labelled::new();
    group.register("f", sig([]), "none").unwrap();
    group.register("f", sig([TypeExpr::any()]), "one").unwrap();
    group.register("f", sig([TypeExpr::any(), TypeExpr::any()]), "two").unwrap();

    assert_eq!(winner(&group, "f", &[]), "none");
    assert_eq!(winner(&group, "f", &[Value::Null]), "one");
    assert_eq!(winner(&group, "f", &[Value::Null, Value::Null]), "two");
    assert!(matches!(
        group.resolve("f", &[Value::Null, Value::Null, Value::Null]),
        Err(DispatchError::NoMatch { .. })
    ));
}

#[test]
fn test_variadic_rest() {
    let group = Labelled::new();
    group
        .register("max", Signature::variadic([TypeExpr::int()], TypeExpr::int()), "ints")
        .unwrap();
    group
        .register(
            "max",
            Signature::variadic([], TypeExpr::data(Kind::number())),
            "numbers",
        )
        .unwrap();

    assert_eq!(winner(&group, "max", &[Value::Int(1)]), "ints");
    assert_eq!(
        winner(&group, "max", &[Value::Int(1), Value::Int(2), Value::Int(3)]),
        "ints"
    );
    assert_eq!(winner(&group, "max", &[Value::Int(1), Value::Float(2.0)]), "numbers");
    assert_eq!(winner(&group, "max", &[]), "numbers");
}

#[test]
fn test_exact_arity_beats_variadic_tie() {
    let group = Labelled::new();
    group
        .register("f", Signature::variadic([TypeExpr::int()], TypeExpr::any()), "open")
        .unwrap();
    group.register("f", sig([TypeExpr::int()]), "closed").unwrap();

    assert_eq!(winner(&group, "f", &[Value::Int(1)]), "closed");
    assert_eq!(winner(&group, "f", &[Value::Int(1), Value::Null]), "open");
}

#[test]
fn test_default_parameters() {
    let group = Labelled::new();
    group
        .register_with_defaults("pad", vec![TypeExpr::str(), TypeExpr::int(), TypeExpr::str()], 1, "pad")
        .unwrap();
    for args in [
        vec![Value::str("x")],
        vec![Value::str("x"), Value::Int(3)],
        vec![Value::str("x"), Value::Int(3), Value::str("-")],
    ] {
        assert_eq!(winner(&group, "pad", &args), "pad");
    }
    assert!(group.resolve("pad", &[]).is_err());
}

// ── Failures ───────────────────────────────────────────────────────────

#[test]
fn test_no_match_carries_argument_types() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::int()]), "int").unwrap();
    let err = group.resolve("f", &[Value::list([Value::str("a")])]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"no overload of `f` accepts (list[str])");
}

#[test]
fn test_ambiguity_message() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::any(), TypeExpr::int()]), "b_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::any()]), "a_int").unwrap();
    let err = group.resolve("f", &[Value::Int(1), Value::Int(1)]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @r"
    ambiguous call to `f` with (int, int); candidates:
      - f(Any, int)
      - f(int, Any)
    ");
}

#[test]
fn test_duplicate_registration() {
    let group = Labelled::new();
    group.register("f", sig([int_or_str()]), "first").unwrap();
    let reordered = sig([TypeExpr::sum([TypeExpr::str(), TypeExpr::int()])]);
    let err = group.register("f", reordered, "second").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"`f(Union[int, str])` is already registered");
    assert_eq!(winner(&group, "f", &[Value::Int(1)]), "first");
}

#[test]
fn test_errors_serialize() {
    let group = Labelled::new();
    group.register("f", sig([TypeExpr::any(), TypeExpr::int()]), "b_int").unwrap();
    group.register("f", sig([TypeExpr::int(), TypeExpr::any()]), "a_int").unwrap();
    let err = group.resolve("f", &[Value::Int(1), Value::Int(1)]).unwrap_err();
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        serde_json::json!({
            "error": "ambiguous",
            "name": "f",
            "arg_types": ["int", "int"],
            "candidates": ["(Any, int)", "(int, Any)"],
        })
    );
}

// ── Calling ────────────────────────────────────────────────────────────

fn describe_int(args: &[Value]) -> String {
    format!("int {}", args[0])
}

fn describe_any(args: &[Value]) -> String {
    format!("value {}", args[0])
}

#[test]
fn test_call_invokes_the_winner() {
    let group: DispatchGroup<fn(&[Value]) -> String> = DispatchGroup::new();
    group.register("describe", sig([TypeExpr::any()]), describe_any).unwrap();
    group.register("describe", sig([TypeExpr::int()]), describe_int).unwrap();

    assert_eq!(group.call("describe", &[Value::Int(7)]).unwrap(), "int 7");
    assert_eq!(group.call("describe", &[Value::str("a")]).unwrap(), r#"value "a""#);
    assert!(group.call("other", &[]).is_err());
}

#[test]
fn test_boxed_closures() {
    type Handler = Box<dyn Fn(&[Value]) -> usize + Send + Sync>;
    let group: DispatchGroup<Handler> = DispatchGroup::new();
    let offset = 10;
    group
        .register(
            "len",
            sig([TypeExpr::data(Kind::list())]),
            Box::new(move |args: &[Value]| args[0].len().unwrap_or(0) + offset),
        )
        .unwrap();
    group
        .register("len", sig([TypeExpr::str()]), Box::new(|_: &[Value]| 0))
        .unwrap();

    let items = Value::list([Value::Null, Value::Null]);
    assert_eq!(group.call("len", &[items]).unwrap(), 12);
    assert_eq!(group.call("len", &[Value::str("abc")]).unwrap(), 0);
}
