//! Dispatch-aware class hierarchy: per-class generic function clones.
//!
//! Every class in the hierarchy owns an independent clone of each generic
//! function it inherits, so registrations against a subclass never mutate an
//! ancestor's registry. Class construction is an explicit build step:
//! whatever mechanism assembles a class calls [`Hierarchy::define`] with a
//! [`ClassDef`] before the class is usable for dispatch.
//!
//! Finalization performs, in order:
//!
//! 1. Install the generic functions declared in the class body.
//! 2. Walk the class's nominal MRO and clone every inherited generic
//!    function not yet seen (first definer wins). A plain attribute in the
//!    class body shadowing an inherited generic function is rejected:
//!    overriding a generic function directly is illegal; register an
//!    overload for the root type instead.
//! 3. Attach the class body's methods: a method carrying overload
//!    declarations is registered into the named generic functions under the
//!    declared (or inferred) types; a method carrying none, whose name
//!    matches a handler already present in a cloned registry, is installed
//!    under that handler's original type.

pub mod instance;

use crate::dispatch::generic::GenericFn;
use crate::dispatch::registry::{HandlerDecl, Overload};
use crate::error::DispatchError;
use crate::graph::{TypeGraph, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

// =============================================================================
// Class Definition Builders
// =============================================================================

/// A pending overload declaration on a method: the target generic function
/// and the type to register under, `None` meaning "infer from the method's
/// declared parameter type".
#[derive(Debug, Clone)]
struct OverloadDecl {
    generic: Arc<str>,
    ty: Option<TypeId>,
}

/// A callable declared in a class body, together with any overload
/// declarations the surface syntax attached to it.
#[derive(Debug, Clone)]
pub struct MethodDef<H> {
    decl: HandlerDecl<H>,
    overloads: Vec<OverloadDecl>,
}

impl<H> MethodDef<H> {
    /// A plain method with the given name and body.
    pub fn new(name: impl Into<Arc<str>>, body: H) -> Self {
        Self {
            decl: HandlerDecl::new(name, body),
            overloads: Vec::new(),
        }
    }

    /// Record the declared type of the method's dispatch parameter.
    pub fn param_ty(mut self, ty: TypeId) -> Self {
        self.decl = self.decl.with_param_ty(ty);
        self
    }

    /// Declare this method as an overload of `generic` for `ty`.
    ///
    /// May be stacked to register one body under several types or generic
    /// functions. Passing `None` infers the type from the declared
    /// parameter type.
    pub fn overload(mut self, generic: impl Into<Arc<str>>, ty: Option<TypeId>) -> Self {
        self.overloads.push(OverloadDecl {
            generic: generic.into(),
            ty,
        });
        self
    }

    /// The method's name.
    pub fn name(&self) -> &Arc<str> {
        &self.decl.name
    }
}

/// Everything a class body contributes: newly declared generic functions
/// (with their default bodies) and methods.
#[derive(Debug, Clone)]
pub struct ClassDef<H> {
    class: TypeId,
    generics: Vec<(Arc<str>, HandlerDecl<H>)>,
    methods: Vec<MethodDef<H>>,
}

impl<H> ClassDef<H> {
    /// Start a definition for the class identified by `class` in the type
    /// graph.
    pub fn new(class: TypeId) -> Self {
        Self {
            class,
            generics: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Declare a new generic function; `default` becomes its root handler.
    pub fn generic(mut self, name: impl Into<Arc<str>>, default: HandlerDecl<H>) -> Self {
        let name = name.into();
        // Class-body semantics: a later declaration replaces an earlier one.
        self.generics.retain(|(n, _)| *n != name);
        self.generics.push((name, default));
        self
    }

    /// Add a method to the class body.
    pub fn method(mut self, method: MethodDef<H>) -> Self {
        self.methods.push(method);
        self
    }
}

// =============================================================================
// Class Node
// =============================================================================

/// One class's generic functions: declared ones plus independent clones of
/// everything inherited. Declaration order is preserved.
#[derive(Debug)]
pub struct ClassNode<H> {
    generics: Vec<(Arc<str>, GenericFn<H>)>,
}

impl<H: Clone> ClassNode<H> {
    fn new() -> Self {
        Self {
            generics: Vec::new(),
        }
    }

    fn insert(&mut self, name: Arc<str>, generic: GenericFn<H>) {
        self.generics.push((name, generic));
    }

    /// Look up a generic function by name.
    pub fn generic(&self, name: &str) -> Option<&GenericFn<H>> {
        self.generics
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, g)| g)
    }

    fn generic_mut(&mut self, name: &str) -> Option<&mut GenericFn<H>> {
        self.generics
            .iter_mut()
            .find(|(n, _)| &**n == name)
            .map(|(_, g)| g)
    }

    /// Names of the class's generic functions, in declaration order.
    pub fn generic_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.generics.iter().map(|(n, _)| n)
    }

    /// Number of generic functions on this class.
    pub fn len(&self) -> usize {
        self.generics.len()
    }

    /// Check if the class carries no generic functions.
    pub fn is_empty(&self) -> bool {
        self.generics.is_empty()
    }
}

// =============================================================================
// Hierarchy
// =============================================================================

/// The dispatch-aware class hierarchy: a table of finalized classes over a
/// shared type graph.
#[derive(Debug)]
pub struct Hierarchy<H> {
    graph: Arc<TypeGraph>,
    classes: FxHashMap<TypeId, ClassNode<H>>,
}

impl<H: Clone> Hierarchy<H> {
    /// Create an empty hierarchy over `graph`.
    pub fn new(graph: Arc<TypeGraph>) -> Self {
        Self {
            graph,
            classes: FxHashMap::default(),
        }
    }

    /// The underlying type graph.
    #[inline]
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Finalize a class definition.
    ///
    /// Must be called exactly once per class, after its bases have been
    /// defined. See the module docs for the finalization steps.
    ///
    /// # Errors
    ///
    /// `UnknownClass` if the class type is not in the graph,
    /// `DuplicateClass` on redefinition, `CannotOverrideGeneric` when a
    /// class-body attribute shadows an inherited generic function,
    /// `UnknownGeneric` when an overload declaration names a generic
    /// function the class does not have, and `MissingAnnotation` when an
    /// overload declaration has no type to register under.
    pub fn define(&mut self, def: ClassDef<H>) -> Result<(), DispatchError> {
        let class = def.class;
        if !self.graph.contains(class) {
            return Err(DispatchError::UnknownClass(class));
        }
        if self.classes.contains_key(&class) {
            return Err(DispatchError::DuplicateClass(class));
        }

        let mut node = ClassNode::new();
        for (name, default) in def.generics {
            node.insert(name.clone(), GenericFn::new(name, default));
        }

        // Attribute names declared in the class body; an inherited generic
        // function colliding with any of them is an illegal override.
        let mut attr_names: FxHashSet<Arc<str>> = FxHashSet::default();
        for (name, _) in &node.generics {
            attr_names.insert(name.clone());
        }
        for method in &def.methods {
            attr_names.insert(method.name().clone());
        }

        let mut patched: FxHashSet<Arc<str>> = FxHashSet::default();
        let mut cloned: Vec<Arc<str>> = Vec::new();
        let mro = self.graph.mro(class);
        for &base in mro.iter().skip(1) {
            let Some(base_node) = self.classes.get(&base) else {
                continue;
            };
            for (name, generic) in &base_node.generics {
                if patched.contains(name) {
                    continue;
                }
                if attr_names.contains(name) {
                    return Err(DispatchError::CannotOverrideGeneric { name: name.clone() });
                }
                node.insert(name.clone(), generic.clone_registry());
                patched.insert(name.clone());
                cloned.push(name.clone());
            }
        }

        for method in def.methods {
            if method.overloads.is_empty() {
                Self::propagate_override(&self.graph, &mut node, &cloned, &method)?;
                continue;
            }
            for decl in &method.overloads {
                let ty = decl.ty.or(method.decl.param_ty).ok_or_else(|| {
                    DispatchError::MissingAnnotation {
                        handler: method.decl.name.clone(),
                    }
                })?;
                let generic = node.generic_mut(&decl.generic).ok_or_else(|| {
                    DispatchError::UnknownGeneric {
                        name: decl.generic.clone(),
                    }
                })?;
                generic.add_overload(
                    &self.graph,
                    ty,
                    Overload::new(method.decl.name.clone(), method.decl.body.clone()),
                )?;
            }
        }

        self.classes.insert(class, node);
        Ok(())
    }

    /// Install an undecorated method over every same-named handler inherited
    /// through a cloned registry, under the handler's original type.
    fn propagate_override(
        graph: &TypeGraph,
        node: &mut ClassNode<H>,
        cloned: &[Arc<str>],
        method: &MethodDef<H>,
    ) -> Result<(), DispatchError> {
        for generic_name in cloned {
            let Some(generic) = node.generic_mut(generic_name) else {
                continue;
            };
            let matched = generic
                .registry()
                .keys_sorted()
                .into_iter()
                .find(|&ty| {
                    generic
                        .registry()
                        .get(ty)
                        .is_some_and(|ov| ov.name() == method.name())
                });
            if let Some(ty) = matched {
                generic.add_overload(
                    graph,
                    ty,
                    Overload::new(method.decl.name.clone(), method.decl.body.clone()),
                )?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// The finalized node for a class, if it has been defined.
    pub fn class_node(&self, class: TypeId) -> Option<&ClassNode<H>> {
        self.classes.get(&class)
    }

    /// A class's own clone of a generic function.
    pub fn generic(&self, class: TypeId, name: &str) -> Result<&GenericFn<H>, DispatchError> {
        let node = self
            .classes
            .get(&class)
            .ok_or(DispatchError::UnknownClass(class))?;
        node.generic(name).ok_or_else(|| DispatchError::UnknownGeneric {
            name: Arc::from(name),
        })
    }

    /// Mutable access to a class's clone, for registrations after the class
    /// has been finalized.
    pub fn generic_mut(
        &mut self,
        class: TypeId,
        name: &str,
    ) -> Result<&mut GenericFn<H>, DispatchError> {
        let node = self
            .classes
            .get_mut(&class)
            .ok_or(DispatchError::UnknownClass(class))?;
        node.generic_mut(name)
            .ok_or_else(|| DispatchError::UnknownGeneric {
                name: Arc::from(name),
            })
    }

    /// Resolve the handler a class's generic function would use for `ty`.
    pub fn dispatch(
        &self,
        class: TypeId,
        name: &str,
        ty: TypeId,
    ) -> Result<Overload<H>, DispatchError> {
        self.generic(class, name)?.dispatch(&self.graph, ty)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        graph: Arc<TypeGraph>,
        int: TypeId,
        float: TypeId,
        base: TypeId,
        sub: TypeId,
    }

    fn fixture() -> Fixture {
        let graph = Arc::new(TypeGraph::new());
        let int = graph.declare("int", &[]).unwrap();
        let float = graph.declare("float", &[]).unwrap();
        let base = graph.declare("Base", &[]).unwrap();
        let sub = graph.declare("Sub", &[base]).unwrap();
        Fixture {
            graph,
            int,
            float,
            base,
            sub,
        }
    }

    fn base_def(fx: &Fixture) -> ClassDef<&'static str> {
        ClassDef::new(fx.base)
            .generic("foo", HandlerDecl::new("foo", "default"))
            .method(MethodDef::new("foo_int", "int").overload("foo", Some(fx.int)))
    }

    #[test]
    fn test_define_and_dispatch() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.int).unwrap().body(),
            &"int"
        );
        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.float).unwrap().body(),
            &"default"
        );
    }

    #[test]
    fn test_subclass_inherits_clone() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();
        hierarchy.define(ClassDef::new(fx.sub)).unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.sub, "foo", fx.int).unwrap().body(),
            &"int"
        );
    }

    #[test]
    fn test_subclass_registration_is_independent() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();
        hierarchy
            .define(
                ClassDef::new(fx.sub)
                    .method(MethodDef::new("foo_float", "float").overload("foo", Some(fx.float))),
            )
            .unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.sub, "foo", fx.float).unwrap().body(),
            &"float"
        );
        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.float).unwrap().body(),
            &"default"
        );
        assert_eq!(
            hierarchy.generic(fx.base, "foo").unwrap().registered_types(),
            vec![fx.int]
        );
    }

    #[test]
    fn test_override_by_name() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();
        hierarchy
            .define(ClassDef::new(fx.sub).method(MethodDef::new("foo_int", "sub int")))
            .unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.sub, "foo", fx.int).unwrap().body(),
            &"sub int"
        );
        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.int).unwrap().body(),
            &"int"
        );
    }

    #[test]
    fn test_plain_shadow_is_rejected() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();

        let err = hierarchy
            .define(ClassDef::new(fx.sub).method(MethodDef::new("foo", "shadow")))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::CannotOverrideGeneric {
                name: Arc::from("foo")
            }
        );
    }

    #[test]
    fn test_redeclared_generic_is_rejected() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();

        let err = hierarchy
            .define(
                ClassDef::new(fx.sub).generic("foo", HandlerDecl::new("foo", "fresh default")),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::CannotOverrideGeneric { .. }));
    }

    #[test]
    fn test_overload_infers_from_param_ty() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy
            .define(
                ClassDef::new(fx.base)
                    .generic("foo", HandlerDecl::new("foo", "default"))
                    .method(
                        MethodDef::new("foo_int", "int")
                            .param_ty(fx.int)
                            .overload("foo", None),
                    ),
            )
            .unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.int).unwrap().body(),
            &"int"
        );
    }

    #[test]
    fn test_overload_without_type_or_annotation() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        let err = hierarchy
            .define(
                ClassDef::new(fx.base)
                    .generic("foo", HandlerDecl::new("foo", "default"))
                    .method(MethodDef::new("foo_int", "int").overload("foo", None)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingAnnotation { .. }));
    }

    #[test]
    fn test_overload_unknown_generic() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        let err = hierarchy
            .define(
                ClassDef::new(fx.base)
                    .method(MethodDef::new("foo_int", "int").overload("foo", Some(fx.int))),
            )
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownGeneric {
                name: Arc::from("foo")
            }
        );
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();
        let err = hierarchy.define(ClassDef::new(fx.base)).unwrap_err();
        assert_eq!(err, DispatchError::DuplicateClass(fx.base));
    }

    #[test]
    fn test_diamond_clones_first_definer() {
        // Mid1 and Mid2 both inherit foo from Base; a class deriving from
        // both clones the generic once, from the first definer in its MRO.
        let fx = fixture();
        let mid1 = fx.graph.declare("Mid1", &[fx.base]).unwrap();
        let mid2 = fx.graph.declare("Mid2", &[fx.base]).unwrap();
        let leaf = fx.graph.declare("Leaf", &[mid1, mid2]).unwrap();

        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();
        hierarchy
            .define(
                ClassDef::new(mid1)
                    .method(MethodDef::new("foo_float", "mid1 float").overload("foo", Some(fx.float))),
            )
            .unwrap();
        hierarchy
            .define(
                ClassDef::new(mid2)
                    .method(MethodDef::new("foo_float", "mid2 float").overload("foo", Some(fx.float))),
            )
            .unwrap();
        hierarchy.define(ClassDef::new(leaf)).unwrap();

        assert_eq!(hierarchy.class_node(leaf).unwrap().len(), 1);
        assert_eq!(
            hierarchy.dispatch(leaf, "foo", fx.float).unwrap().body(),
            &"mid1 float"
        );
    }

    #[test]
    fn test_stacked_overloads_share_one_body() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy
            .define(
                ClassDef::new(fx.base)
                    .generic("foo", HandlerDecl::new("foo", "default"))
                    .method(
                        MethodDef::new("foo_num", "number")
                            .overload("foo", Some(fx.int))
                            .overload("foo", Some(fx.float)),
                    ),
            )
            .unwrap();

        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.int).unwrap().body(),
            &"number"
        );
        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.float).unwrap().body(),
            &"number"
        );
    }

    #[test]
    fn test_generic_mut_allows_late_registration() {
        let fx = fixture();
        let mut hierarchy = Hierarchy::new(fx.graph.clone());
        hierarchy.define(base_def(&fx)).unwrap();

        let graph = fx.graph.clone();
        hierarchy
            .generic_mut(fx.base, "foo")
            .unwrap()
            .register(&graph, Some(fx.float), HandlerDecl::new("foo_float", "late"))
            .unwrap();
        assert_eq!(
            hierarchy.dispatch(fx.base, "foo", fx.float).unwrap().body(),
            &"late"
        );
    }
}
