//! Generic function: overload registry + token-validated dispatch cache.
//!
//! A [`GenericFn`] owns one [`Registry`] and memoizes resolution results per
//! runtime type. The memo is destroyed wholesale, never per key: any
//! registration clears it, and if the registry holds at least one key with
//! an abstract manifest the cache also stores the process-wide token version
//! it was filled under and re-validates against the current version before
//! trusting an entry.
//!
//! # Cache Hierarchy
//!
//! 1. **Exact registry hit** - the runtime type is registered itself
//! 2. **Dispatch cache** - memoized composed-order resolution
//! 3. **Full resolution** - [`find_impl`], populates the cache
//!
//! # Thread Safety
//!
//! Dispatch takes `&self` and is safe to call from multiple threads; the
//! cache is behind a `parking_lot::RwLock` and the hit counters are atomic.
//! Registration takes `&mut self`, so concurrent registration and dispatch
//! on the same function is ruled out statically; callers sharing a function
//! across threads must wrap it in their own mutual exclusion to register.
//!
//! Cache keys are `Copy` type ids, so the memo cannot keep host objects
//! alive.

use crate::dispatch::registry::{HandlerDecl, Overload, Registry};
use crate::dispatch::resolve::find_impl;
use crate::dispatch::token;
use crate::error::DispatchError;
use crate::graph::{TypeGraph, TypeId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Dispatch Cache
// =============================================================================

#[derive(Debug)]
struct DispatchCache<H> {
    entries: FxHashMap<TypeId, Overload<H>>,
    /// Token version the cache was filled under. `Some` once the registry
    /// has seen an abstract key; `None` caches never expire by token.
    token: Option<u64>,
}

impl<H> DispatchCache<H> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            token: None,
        }
    }
}

// =============================================================================
// Generic Function
// =============================================================================

/// A single-dispatch generic function: a named registry of overloads plus a
/// dispatch cache.
///
/// The handler payload `H` is opaque to the dispatch engine; it only needs
/// to be cloneable so resolved handlers can be memoized and returned by
/// value.
#[derive(Debug)]
pub struct GenericFn<H> {
    name: Arc<str>,
    registry: Registry<H>,
    cache: RwLock<DispatchCache<H>>,

    /// Cache hit counter.
    hits: AtomicU64,
    /// Cache miss counter.
    misses: AtomicU64,
    /// Number of wholesale cache invalidations.
    invalidations: AtomicU64,
}

impl<H: Clone> GenericFn<H> {
    /// Create a generic function whose default body handles the root type.
    pub fn new(name: impl Into<Arc<str>>, default: HandlerDecl<H>) -> Self {
        Self {
            name: name.into(),
            registry: Registry::new(default.into_overload()),
            cache: RwLock::new(DispatchCache::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// The generic function's name.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Read-only view of the registry, the root entry included.
    #[inline]
    pub fn registry(&self) -> &Registry<H> {
        &self.registry
    }

    /// All registered types excluding the root, ascending.
    pub fn registered_types(&self) -> Vec<TypeId> {
        self.registry.registered_types()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a handler for `ty`, or for the handler's declared parameter
    /// type when `ty` is `None`.
    ///
    /// # Errors
    ///
    /// `MissingAnnotation` when no type is given and the declaration carries
    /// no parameter type; `UnknownType` when the target type is not in the
    /// graph.
    pub fn register(
        &mut self,
        graph: &TypeGraph,
        ty: Option<TypeId>,
        decl: HandlerDecl<H>,
    ) -> Result<(), DispatchError> {
        let ty = ty
            .or(decl.param_ty)
            .ok_or_else(|| DispatchError::MissingAnnotation {
                handler: decl.name.clone(),
            })?;
        self.add_overload(graph, ty, decl.into_overload())
    }

    /// Insert a handler for exactly `ty`, overwriting any existing entry.
    ///
    /// Clears the dispatch cache. The first time an abstract type is
    /// registered, the current token version is acquired so the cache also
    /// re-validates against later hierarchy changes.
    pub fn add_overload(
        &mut self,
        graph: &TypeGraph,
        ty: TypeId,
        overload: Overload<H>,
    ) -> Result<(), DispatchError> {
        if !graph.contains(ty) {
            return Err(DispatchError::UnknownType(ty));
        }
        self.registry.insert(ty, overload);

        let cache = self.cache.get_mut();
        if cache.token.is_none() && graph.is_abstract(ty) {
            cache.token = Some(token::current());
        }
        cache.entries.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Resolve the handler for a runtime type.
    ///
    /// Pure query: the registry is never mutated. Results are memoized per
    /// type; after any registration or token bump the next call recomputes.
    ///
    /// # Errors
    ///
    /// `UnknownType` for a type not in the graph, `AmbiguousDispatch` when
    /// two unrelated interface matches tie.
    pub fn dispatch(&self, graph: &TypeGraph, ty: TypeId) -> Result<Overload<H>, DispatchError> {
        if !graph.contains(ty) {
            return Err(DispatchError::UnknownType(ty));
        }

        {
            let cache = self.cache.read();
            let valid = match cache.token {
                Some(stored) => stored == token::current(),
                None => true,
            };
            if valid {
                if let Some(cached) = cache.entries.get(&ty) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(cached.clone());
                }
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut cache = self.cache.write();
        if let Some(stored) = cache.token {
            let current = token::current();
            if stored != current {
                cache.entries.clear();
                cache.token = Some(current);
                self.invalidations.fetch_add(1, Ordering::Relaxed);
            }
        }

        let resolved = match self.registry.get(ty) {
            Some(exact) => exact.clone(),
            None => find_impl(graph, &self.registry, ty)?.clone(),
        };
        cache.entries.insert(ty, resolved.clone());
        Ok(resolved)
    }

    /// Drop every memoized resolution.
    pub fn cache_clear(&self) {
        let mut cache = self.cache.write();
        cache.entries.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Independent copy: same name, copied registry entries, empty cache.
    ///
    /// Mutating the copy never affects the original. If any copied key is
    /// abstract the copy samples the current token version, so hierarchy
    /// changes that postdate the clone still invalidate its cache.
    pub fn clone_registry(&self) -> Self {
        let mut cache = DispatchCache::new();
        if self.cache.read().token.is_some() {
            cache.token = Some(token::current());
        }
        Self {
            name: self.name.clone(),
            registry: self.registry.clone(),
            cache: RwLock::new(cache),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Cache statistics: (hits, misses, invalidations).
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.invalidations.load(Ordering::Relaxed),
        )
    }

    /// Cache hit rate as a percentage; 0.0 before any lookups.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

impl<H: Clone> Clone for GenericFn<H> {
    /// Cloning is registry duplication; see [`GenericFn::clone_registry`].
    fn clone(&self) -> Self {
        self.clone_registry()
    }
}

// =============================================================================
// Tests
// =============================================================================
