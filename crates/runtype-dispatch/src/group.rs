//! Dispatch groups: named overload tables plus their resolution cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use runtype_common::Value;
use runtype_typeck::{observed_type, Comparator, TypeExpr, Validator};

use crate::cache::ResolutionCache;
use crate::error::DispatchError;
use crate::resolve::{resolve_overload, Outcome};
use crate::signature::{Overload, Signature};

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Memoize outcomes by observed argument types.
    pub cache: bool,
    /// Entries kept per function name before its cache is cleared.
    pub cache_capacity: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions {
            cache: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// A snapshot of a group's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Full filter-and-rank passes.
    pub resolutions: u64,
    pub cache_hits: u64,
    /// Resolutions that skipped the cache because an overload carries a
    /// predicate.
    pub cache_bypasses: u64,
    /// Registrations that cleared the cache.
    pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    cache_bypasses: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct FunctionTable<F> {
    overloads: Vec<Arc<Overload<F>>>,
    /// False once any overload's outcome can depend on more than the
    /// observed argument types.
    cacheable: bool,
}

impl<F> Default for FunctionTable<F> {
    fn default() -> Self {
        FunctionTable {
            overloads: Vec::new(),
            cacheable: true,
        }
    }
}

impl<F> FunctionTable<F> {
    fn push(&mut self, signature: Signature, callable: F) {
        self.cacheable &= !signature.has_predicates();
        self.overloads.push(Arc::new(Overload {
            signature,
            callable,
        }));
    }

    fn find_equivalent(&self, signature: &Signature, cmp: &Comparator) -> Option<&Signature> {
        self.overloads
            .iter()
            .map(|o| &o.signature)
            .find(|existing| existing.is_equivalent(signature, cmp))
    }
}

/// An isolated namespace of overloaded functions.
///
/// Registration is append-only. Every successful registration clears the
/// whole resolution cache, since a new overload can change any outcome.
///
/// Lock order is tables then cache. A resolution keeps the tables read
/// lock while it writes its outcome, so a registration can never
/// interleave between computing an outcome and caching it.
pub struct DispatchGroup<F> {
    options: DispatchOptions,
    tables: RwLock<FxHashMap<String, FunctionTable<F>>>,
    cache: ResolutionCache<F>,
    counters: Counters,
    validator: Validator,
    comparator: Comparator,
}

impl<F> DispatchGroup<F> {
    pub fn new() -> Self {
        Self::with_options(DispatchOptions::default())
    }

    pub fn with_options(options: DispatchOptions) -> Self {
        DispatchGroup {
            options,
            tables: RwLock::new(FxHashMap::default()),
            cache: ResolutionCache::new(options.cache_capacity),
            counters: Counters::default(),
            validator: Validator::default(),
            comparator: Comparator::default(),
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Add an overload under `name`.
    ///
    /// Fails with [`DispatchError::DuplicateSignature`] if an equivalent
    /// signature is already registered; the table is then unchanged.
    pub fn register(
        &self,
        name: &str,
        signature: Signature,
        callable: F,
    ) -> Result<(), DispatchError> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables
            .get(name)
            .and_then(|t| t.find_equivalent(&signature, &self.comparator))
        {
            return Err(DispatchError::DuplicateSignature {
                name: name.to_string(),
                signature: existing.clone(),
            });
        }
        debug!(name, signature = %signature, "registering overload");
        let table = tables.entry(name.to_string()).or_default();
        table.push(signature, callable);
        self.invalidate(name);
        Ok(())
    }

    /// Register one overload per admissible prefix of `params`, from
    /// `required` parameters up to all of them. Either every prefix is
    /// registered or none is.
    ///
    /// # Panics
    ///
    /// If `required` exceeds the number of parameters.
    pub fn register_with_defaults(
        &self,
        name: &str,
        params: Vec<TypeExpr>,
        required: usize,
        callable: F,
    ) -> Result<(), DispatchError>
    where
        F: Clone,
    {
        assert!(
            required <= params.len(),
            "`{}` requires {} parameters but declares {}",
            name,
            required,
            params.len()
        );
        let signatures: Vec<Signature> = (required..=params.len())
            .map(|n| Signature::new(params[..n].iter().cloned()))
            .collect();

        let mut tables = self.tables.write();
        if let Some(table) = tables.get(name) {
            for signature in &signatures {
                if let Some(existing) = table.find_equivalent(signature, &self.comparator) {
                    return Err(DispatchError::DuplicateSignature {
                        name: name.to_string(),
                        signature: existing.clone(),
                    });
                }
            }
        }
        let table = tables.entry(name.to_string()).or_default();
        for signature in signatures {
            debug!(name, signature = %signature, "registering overload");
            table.push(signature, callable.clone());
        }
        self.invalidate(name);
        Ok(())
    }

    /// Select the most specific overload of `name` accepting `args`.
    pub fn resolve(&self, name: &str, args: &[Value]) -> Result<Arc<Overload<F>>, DispatchError> {
        let tables = self.tables.read();
        let Some(table) = tables.get(name) else {
            return Err(DispatchError::NoMatch {
                name: name.to_string(),
                arg_types: args.iter().map(observed_type).collect(),
            });
        };

        if !self.options.cache {
            return self.resolve_uncached(name, table, args);
        }
        if !table.cacheable {
            Counters::bump(&self.counters.cache_bypasses);
            trace!(name, "cache bypassed for predicate-bearing overloads");
            return self.resolve_uncached(name, table, args);
        }

        let key: Vec<TypeExpr> = args.iter().map(observed_type).collect();
        if let Some(outcome) = self.cache.get(name, &key) {
            Counters::bump(&self.counters.cache_hits);
            trace!(name, "resolution cache hit");
            return outcome;
        }
        trace!(name, "resolution cache miss");
        let outcome = self.resolve_uncached(name, table, args);
        self.cache.insert(name, key, outcome.clone());
        outcome
    }

    /// Resolve and invoke the winning callable.
    pub fn call<R>(&self, name: &str, args: &[Value]) -> Result<R, DispatchError>
    where
        F: Fn(&[Value]) -> R,
    {
        let overload = self.resolve(name, args)?;
        Ok((overload.callable)(args))
    }

    /// Registered signatures of `name`, in registration order.
    pub fn signatures(&self, name: &str) -> Vec<Signature> {
        self.tables
            .read()
            .get(name)
            .map(|t| t.overloads.iter().map(|o| o.signature.clone()).collect())
            .unwrap_or_default()
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cached_outcomes(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            resolutions: c.resolutions.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_bypasses: c.cache_bypasses.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
        }
    }

    fn resolve_uncached(&self, name: &str, table: &FunctionTable<F>, args: &[Value]) -> Outcome<F> {
        Counters::bump(&self.counters.resolutions);
        resolve_overload(name, &table.overloads, args, &self.validator, &self.comparator)
    }

    /// Called with the tables write lock held.
    fn invalidate(&self, name: &str) {
        let dropped = self.cache.clear();
        Counters::bump(&self.counters.invalidations);
        debug!(name, dropped, "resolution cache invalidated");
    }
}

impl<F> Default for DispatchGroup<F> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
