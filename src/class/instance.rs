//! Runtime instances, per-instance registry overlays, and the call surface.
//!
//! An [`Instance`] is a runtime object of a hierarchy class. Instances share
//! their class's generic function clones until the first instance-level
//! registration, which copies the owning registry into a private overlay on
//! that instance; sibling instances and the class keep the shared clone.
//!
//! # Call forms
//!
//! - **Bound** ([`Hierarchy::call`]): resolves through the instance's
//!   overlay when present, the class clone otherwise, and dispatches on the
//!   runtime type of the first argument.
//! - **Unbound** ([`Hierarchy::call_class`]): always uses the named class's
//!   own clone, ignoring the receiver's overlay and any more-derived class's
//!   registry, and dispatches on the first argument after the receiver.

use crate::class::Hierarchy;
use crate::dispatch::generic::GenericFn;
use crate::dispatch::registry::{HandlerDecl, Overload, Registry};
use crate::error::DispatchError;
use crate::graph::{TypeGraph, TypeId};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Typed Values
// =============================================================================

/// A value the dispatcher can observe the runtime type of.
pub trait TypedValue {
    /// The value's runtime type.
    fn type_of(&self) -> TypeId;
}

// =============================================================================
// Callable Handler Payload
// =============================================================================

/// The canonical callable handler payload: invoked with the receiving
/// instance and the original argument list.
pub struct Handler<V>(Arc<dyn Fn(&Instance<V>, &[V]) -> V + Send + Sync>);

impl<V> Handler<V> {
    /// Wrap a closure as a handler body.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Instance<V>, &[V]) -> V + Send + Sync + 'static,
    {
        Self(Arc::new(body))
    }

    /// Invoke the handler.
    #[inline]
    pub fn invoke(&self, instance: &Instance<V>, args: &[V]) -> V {
        (self.0)(instance, args)
    }
}

impl<V> Clone for Handler<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> fmt::Debug for Handler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

// =============================================================================
// Instance
// =============================================================================

/// A runtime object of a hierarchy class.
///
/// The overlay table is allocated lazily on the first instance-level
/// registration; instances that never register stay a bare class id.
#[derive(Debug)]
pub struct Instance<V> {
    class: TypeId,
    overlays: Option<Box<FxHashMap<Arc<str>, GenericFn<Handler<V>>>>>,
}

impl<V> Instance<V> {
    /// Create an instance of `class`.
    pub fn new(class: TypeId) -> Self {
        Self {
            class,
            overlays: None,
        }
    }

    /// The instance's class.
    #[inline]
    pub fn class_id(&self) -> TypeId {
        self.class
    }

    /// The instance's private clone of a generic function, if one exists.
    pub fn overlay(&self, name: &str) -> Option<&GenericFn<Handler<V>>> {
        self.overlays.as_ref()?.get(name)
    }

    /// Check whether the instance has its own clone of `name`.
    pub fn has_overlay(&self, name: &str) -> bool {
        self.overlay(name).is_some()
    }

    /// Register a handler on this instance only.
    ///
    /// The first registration against a generic function clones the owning
    /// class's registry into a private slot on this instance; the class and
    /// sibling instances are unaffected. `ty` may be `None` to infer the
    /// type from the declaration's parameter type.
    pub fn register(
        &mut self,
        hierarchy: &Hierarchy<Handler<V>>,
        generic: &str,
        ty: Option<TypeId>,
        decl: HandlerDecl<Handler<V>>,
    ) -> Result<(), DispatchError> {
        if self.overlay(generic).is_none() {
            let class_generic = hierarchy.generic(self.class, generic)?;
            self.overlays
                .get_or_insert_with(Default::default)
                .insert(Arc::from(generic), class_generic.clone_registry());
        }
        let overlay = self
            .overlays
            .as_mut()
            .and_then(|map| map.get_mut(generic))
            .ok_or_else(|| DispatchError::UnknownGeneric {
                name: Arc::from(generic),
            })?;
        overlay.register(hierarchy.graph(), ty, decl)
    }
}

// =============================================================================
// Bound Method View
// =============================================================================

/// Read-only view of one generic function as seen from an instance: the
/// overlay when the instance has one, the class clone otherwise.
pub struct Bound<'a, V> {
    hierarchy: &'a Hierarchy<Handler<V>>,
    instance: &'a Instance<V>,
    generic: &'a GenericFn<Handler<V>>,
}

impl<'a, V> Bound<'a, V> {
    /// Resolve the handler for a runtime type.
    pub fn dispatch(&self, ty: TypeId) -> Result<Overload<Handler<V>>, DispatchError> {
        self.generic.dispatch(self.hierarchy.graph(), ty)
    }

    /// The effective registry, the root entry included.
    pub fn registry(&self) -> &'a Registry<Handler<V>> {
        self.generic.registry()
    }

    /// All registered types excluding the root, ascending.
    pub fn registered_types(&self) -> Vec<TypeId> {
        self.generic.registered_types()
    }
}

impl<V: TypedValue> Bound<'_, V> {
    /// Invoke the generic function: dispatch on the first argument's runtime
    /// type and call the resolved handler with the instance and the full
    /// argument list.
    pub fn call(&self, args: &[V]) -> Result<V, DispatchError> {
        let ty = args
            .first()
            .map(TypedValue::type_of)
            .ok_or(DispatchError::MissingDispatchArgument)?;
        let resolved = self.dispatch(ty)?;
        Ok(resolved.body().invoke(self.instance, args))
    }
}

// =============================================================================
// Call Surface
// =============================================================================

impl<V> Hierarchy<Handler<V>> {
    /// Bind a generic function to an instance for read-only access.
    pub fn bind<'a>(
        &'a self,
        instance: &'a Instance<V>,
        name: &str,
    ) -> Result<Bound<'a, V>, DispatchError> {
        let generic = match instance.overlay(name) {
            Some(overlay) => overlay,
            None => self.generic(instance.class_id(), name)?,
        };
        Ok(Bound {
            hierarchy: self,
            instance,
            generic,
        })
    }
}

impl<V: TypedValue> Hierarchy<Handler<V>> {
    /// Bound call: dispatch on the first argument's runtime type, honoring
    /// the instance's overlay.
    pub fn call(
        &self,
        instance: &Instance<V>,
        name: &str,
        args: &[V],
    ) -> Result<V, DispatchError> {
        self.bind(instance, name)?.call(args)
    }

    /// Unbound call through a named class: always resolves against that
    /// class's own registry, ignoring the receiver's overlay and any
    /// more-derived class's registrations, and dispatches on the first
    /// argument after the receiver.
    pub fn call_class(
        &self,
        class: TypeId,
        name: &str,
        receiver: &Instance<V>,
        args: &[V],
    ) -> Result<V, DispatchError> {
        let ty = args
            .first()
            .map(TypedValue::type_of)
            .ok_or(DispatchError::MissingDispatchArgument)?;
        let resolved = self.generic(class, name)?.dispatch(self.graph(), ty)?;
        Ok(resolved.body().invoke(receiver, args))
    }
}

impl<V: TypedValue> GenericFn<Handler<V>> {
    /// Call the generic function directly, outside any class binding:
    /// dispatch on the first argument's runtime type.
    pub fn call(
        &self,
        graph: &TypeGraph,
        receiver: &Instance<V>,
        args: &[V],
    ) -> Result<V, DispatchError> {
        let ty = args
            .first()
            .map(TypedValue::type_of)
            .ok_or(DispatchError::MissingDispatchArgument)?;
        let resolved = self.dispatch(graph, ty)?;
        Ok(resolved.body().invoke(receiver, args))
    }
}

// =============================================================================
// Tests
// =============================================================================
