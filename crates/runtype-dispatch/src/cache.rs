//! Memoized resolution outcomes, keyed per name by observed argument types.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use runtype_typeck::TypeExpr;

use crate::resolve::Outcome;

type NameEntries<F> = FxHashMap<Vec<TypeExpr>, Outcome<F>>;

pub(crate) struct ResolutionCache<F> {
    entries: RwLock<FxHashMap<String, NameEntries<F>>>,
    capacity: usize,
}

impl<F> ResolutionCache<F> {
    pub(crate) fn new(capacity: usize) -> Self {
        ResolutionCache {
            entries: RwLock::new(FxHashMap::default()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn get(&self, name: &str, key: &[TypeExpr]) -> Option<Outcome<F>> {
        self.entries.read().get(name)?.get(key).cloned()
    }

    /// Store an outcome. A name that has reached capacity starts over.
    pub(crate) fn insert(&self, name: &str, key: Vec<TypeExpr>, outcome: Outcome<F>) {
        let mut entries = self.entries.write();
        let slot = entries.entry(name.to_string()).or_default();
        if slot.len() >= self.capacity && !slot.contains_key(&key) {
            debug!(name, capacity = self.capacity, "resolution cache full, clearing");
            slot.clear();
        }
        slot.insert(key, outcome);
    }

    /// Drop every entry. Returns how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let dropped = entries.values().map(|e| e.len()).sum();
        entries.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().values().map(|e| e.len()).sum()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    fn no_match(name: &str) -> Outcome<()> {
        Err(DispatchError::NoMatch {
            name: name.to_string(),
            arg_types: vec![],
        })
    }

    #[test]
    fn entries_are_per_name() {
        let cache = ResolutionCache::<()>::new(8);
        cache.insert("f", vec![TypeExpr::int()], no_match("f"));
        assert!(cache.get("f", &[TypeExpr::int()]).is_some());
        assert!(cache.get("g", &[TypeExpr::int()]).is_none());
        assert!(cache.get("f", &[TypeExpr::str()]).is_none());
    }

    #[test]
    fn full_name_starts_over() {
        let cache = ResolutionCache::<()>::new(2);
        cache.insert("f", vec![TypeExpr::int()], no_match("f"));
        cache.insert("f", vec![TypeExpr::str()], no_match("f"));
        cache.insert("g", vec![TypeExpr::str()], no_match("g"));
        assert_eq!(cache.len(), 3);
        cache.insert("f", vec![TypeExpr::float()], no_match("f"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("f", &[TypeExpr::float()]).is_some());
        assert!(cache.get("g", &[TypeExpr::str()]).is_some());
    }

    #[test]
    fn clear_reports_dropped_entries() {
        let cache = ResolutionCache::<()>::new(8);
        cache.insert("f", vec![TypeExpr::int()], no_match("f"));
        cache.insert("g", vec![], no_match("g"));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.len(), 0);
    }
}
