//! Shared dispatch groups under concurrent registration and resolution.

use std::sync::Arc;
use std::thread;

use runtype_common::Value;
use runtype_dispatch::{DispatchGroup, Signature};
use runtype_typeck::TypeExpr;

/// Readers never observe a stale winner once a dominating overload is in.
#[test]
fn test_resolve_while_registering() {
    let group: Arc<DispatchGroup<&'static str>> = Arc::new(DispatchGroup::new());
    group.register("f", Signature::new([TypeExpr::any()]), "any").unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let group = Arc::clone(&group);
            thread::spawn(move || {
                let mut seen_int = false;
                for _ in 0..500 {
                    let winner = group.resolve("f", &[Value::Int(1)]).unwrap().callable;
                    if seen_int {
                        assert_eq!(winner, "int", "winner regressed after registration");
                    }
                    seen_int |= winner == "int";
                }
            })
        })
        .collect();

    let writer = {
        let group = Arc::clone(&group);
        thread::spawn(move || {
            group.register("f", Signature::new([TypeExpr::int()]), "int").unwrap();
            for i in 0..50 {
                let name = format!("g{}", i);
                group.register(&name, Signature::new([TypeExpr::str()]), "g").unwrap();
            }
        })
    };

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(group.resolve("f", &[Value::Int(1)]).unwrap().callable, "int");
    assert_eq!(group.names().len(), 51);
}

#[test]
fn test_concurrent_duplicates_register_once() {
    let group: Arc<DispatchGroup<usize>> = Arc::new(DispatchGroup::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let group = Arc::clone(&group);
            thread::spawn(move || {
                group
                    .register("f", Signature::new([TypeExpr::int()]), i)
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(group.signatures("f").len(), 1);
}
