//! Runtime single-dispatch generic methods.
//!
//! A generic function is a callable whose behavior varies with the runtime
//! type of one argument. Overloads are registered per type and resolved
//! through a deterministic linearization of the type's ancestors, including
//! abstract marker types the type implements only structurally.
//!
//! This crate provides:
//! - Explicit type graph with nominal bases and virtual implementation edges
//! - C3 linearization, extended with abstract marker splicing
//! - Per-function overload registries with a root-type default
//! - Token-validated dispatch caches with hit/miss statistics
//! - Per-class registry cloning, so subclasses extend dispatch behavior
//!   without mutating their base class's table
//! - Per-instance copy-on-write registry overlays
//!
//! # Example
//!
//! ```
//! use singledispatch::{
//!     ClassDef, Handler, HandlerDecl, Hierarchy, Instance, MethodDef, TypeGraph, TypeId,
//!     TypedValue,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Val(TypeId, &'static str);
//!
//! impl TypedValue for Val {
//!     fn type_of(&self) -> TypeId {
//!         self.0
//!     }
//! }
//!
//! fn label(text: &'static str) -> Handler<Val> {
//!     Handler::new(move |_, _| Val(TypeId::OBJECT, text))
//! }
//!
//! let graph = Arc::new(TypeGraph::new());
//! let int = graph.declare("int", &[]).unwrap();
//! let base = graph.declare("Base", &[]).unwrap();
//! let sub = graph.declare("Sub", &[base]).unwrap();
//!
//! let mut hierarchy = Hierarchy::new(graph.clone());
//! hierarchy
//!     .define(
//!         ClassDef::new(base)
//!             .generic("describe", HandlerDecl::new("describe", label("anything")))
//!             .method(MethodDef::new("describe_int", label("an int")).overload("describe", Some(int))),
//!     )
//!     .unwrap();
//! hierarchy.define(ClassDef::new(sub)).unwrap();
//!
//! let obj = Instance::new(sub);
//! let result = hierarchy.call(&obj, "describe", &[Val(int, "")]).unwrap();
//! assert_eq!(result.1, "an int");
//! ```

pub mod class;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod mro;

// Re-export commonly used items
pub use class::instance::{Bound, Handler, Instance, TypedValue};
pub use class::{ClassDef, ClassNode, Hierarchy, MethodDef};
pub use dispatch::{GenericFn, HandlerDecl, Overload, Registry, compose_mro, find_impl};
pub use error::DispatchError;
pub use graph::{Bases, TypeFlags, TypeGraph, TypeId};
pub use mro::{Mro, MroError, c3_merge, compute_c3_mro, linearize};
