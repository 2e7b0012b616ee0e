//! Per-function overload table.
//!
//! A [`Registry`] maps a type to the handler registered for it. Every
//! registry holds an entry for the root type, installed at construction from
//! the generic function's default body; keys are unique and carry no
//! ordering significance. Enumeration surfaces use ascending [`TypeId`]
//! (declaration order) as the deterministic iteration order.

use crate::graph::TypeId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

// =============================================================================
// Registered Handler
// =============================================================================

/// A handler installed in a registry: the opaque body plus the name of the
/// function it came from. The name is what override-by-name propagation
/// matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overload<H> {
    name: Arc<str>,
    body: H,
}

impl<H> Overload<H> {
    /// Create a named handler.
    pub fn new(name: impl Into<Arc<str>>, body: H) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Name of the originating function.
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The handler body.
    #[inline]
    pub fn body(&self) -> &H {
        &self.body
    }
}

// =============================================================================
// Registration Fact
// =============================================================================

/// Registration-time fact produced by the surface syntax: the handler, its
/// name, and the declared type of its dispatch parameter if one was written.
///
/// When a registration omits the explicit target type, `param_ty` is the
/// annotation the type is inferred from.
#[derive(Debug, Clone)]
pub struct HandlerDecl<H> {
    pub name: Arc<str>,
    pub param_ty: Option<TypeId>,
    pub body: H,
}

impl<H> HandlerDecl<H> {
    /// A declaration with no parameter annotation.
    pub fn new(name: impl Into<Arc<str>>, body: H) -> Self {
        Self {
            name: name.into(),
            param_ty: None,
            body,
        }
    }

    /// Attach the declared dispatch-parameter type.
    pub fn with_param_ty(mut self, ty: TypeId) -> Self {
        self.param_ty = Some(ty);
        self
    }

    pub(crate) fn into_overload(self) -> Overload<H> {
        Overload {
            name: self.name,
            body: self.body,
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Type → handler table for one generic function in one scope.
///
/// Invariant: the root entry is installed at construction and there is no
/// removal operation, so lookups can always fall through to it.
#[derive(Debug, Clone)]
pub struct Registry<H> {
    entries: FxHashMap<TypeId, Overload<H>>,
}

impl<H> Registry<H> {
    /// Create a registry with `default` bound to the root type.
    pub fn new(default: Overload<H>) -> Self {
        let mut entries = FxHashMap::default();
        entries.insert(TypeId::OBJECT, default);
        Self { entries }
    }

    /// Insert or overwrite the handler for a type.
    pub fn insert(&mut self, ty: TypeId, overload: Overload<H>) {
        self.entries.insert(ty, overload);
    }

    /// Get the handler registered for exactly `ty`.
    #[inline]
    pub fn get(&self, ty: TypeId) -> Option<&Overload<H>> {
        self.entries.get(&ty)
    }

    /// Check if a handler is registered for exactly `ty`.
    #[inline]
    pub fn contains(&self, ty: TypeId) -> bool {
        self.entries.contains_key(&ty)
    }

    /// The root entry.
    pub fn root(&self) -> &Overload<H> {
        self.entries
            .get(&TypeId::OBJECT)
            .expect("root entry is installed at construction")
    }

    /// Number of entries, the root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A registry is never empty; it always holds the root entry.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Overload<H>)> {
        self.entries.iter().map(|(&ty, ov)| (ty, ov))
    }

    /// All registered keys, the root included, ascending.
    pub fn keys_sorted(&self) -> Vec<TypeId> {
        let mut keys: Vec<TypeId> = self.entries.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// All registered types excluding the root, ascending.
    pub fn registered_types(&self) -> Vec<TypeId> {
        let mut keys: Vec<TypeId> = self
            .entries
            .keys()
            .copied()
            .filter(|&ty| ty != TypeId::OBJECT)
            .collect();
        keys.sort_unstable();
        keys
    }
}

// =============================================================================
// Tests
// =============================================================================
