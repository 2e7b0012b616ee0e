//! Error types for registration, class construction, and dispatch.
//!
//! All failures are raised synchronously at the point of violation and are
//! never retried or swallowed internally; this is a pure library and errors
//! surface directly to the caller.

use crate::graph::TypeId;
use crate::mro::MroError;
use std::fmt;
use std::sync::Arc;

/// Errors produced by the dispatch system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The type hierarchy admits no consistent linearization.
    InconsistentHierarchy,

    /// A declared base type is not present in the graph.
    UnknownBase(TypeId),

    /// Two unrelated, equally specific interface matches were found while
    /// resolving a type; neither is more specific than the other.
    AmbiguousDispatch {
        /// Name of the first matching interface type.
        first: Arc<str>,
        /// Name of the second, unrelated matching interface type.
        second: Arc<str>,
    },

    /// A class body declares a plain attribute that shadows an inherited
    /// generic function without registering an overload.
    CannotOverrideGeneric { name: Arc<str> },

    /// A handler was registered with no explicit type and no declared
    /// parameter type to infer one from.
    MissingAnnotation { handler: Arc<str> },

    /// A `TypeId` that is not present in the type graph.
    UnknownType(TypeId),

    /// The class has not been defined in this hierarchy.
    UnknownClass(TypeId),

    /// No generic function with this name exists on the class.
    UnknownGeneric { name: Arc<str> },

    /// `implement` was called with a marker that carries no abstract
    /// manifest.
    NotAbstract(TypeId),

    /// Recording the implementation edge would make the marker a descendant
    /// of itself.
    InheritanceCycle {
        subclass: Arc<str>,
        marker: Arc<str>,
    },

    /// The class was already defined in this hierarchy.
    DuplicateClass(TypeId),

    /// A generic function was called without the argument it dispatches on.
    MissingDispatchArgument,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentHierarchy => write!(f, "inconsistent hierarchy"),
            Self::UnknownBase(id) => write!(f, "unknown base type id {}", id.raw()),
            Self::AmbiguousDispatch { first, second } => {
                write!(f, "ambiguous dispatch: {} or {}", first, second)
            }
            Self::CannotOverrideGeneric { name } => write!(
                f,
                "cannot override generic function '{}'; register an overload for the root type instead",
                name
            ),
            Self::MissingAnnotation { handler } => write!(
                f,
                "handler '{}' has no declared parameter type; pass an explicit type instead",
                handler
            ),
            Self::UnknownType(id) => write!(f, "type id {} is not in the graph", id.raw()),
            Self::UnknownClass(id) => {
                write!(f, "class id {} has not been defined in this hierarchy", id.raw())
            }
            Self::UnknownGeneric { name } => {
                write!(f, "no generic function named '{}'", name)
            }
            Self::NotAbstract(id) => write!(
                f,
                "type id {} carries no abstract manifest and cannot be implemented",
                id.raw()
            ),
            Self::InheritanceCycle { subclass, marker } => write!(
                f,
                "refusing to create an inheritance cycle: {} is already an ancestor of {}",
                subclass, marker
            ),
            Self::DuplicateClass(id) => {
                write!(f, "class id {} is already defined in this hierarchy", id.raw())
            }
            Self::MissingDispatchArgument => {
                write!(f, "generic function called without a dispatch argument")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<MroError> for DispatchError {
    fn from(err: MroError) -> Self {
        match err {
            MroError::InconsistentHierarchy => Self::InconsistentHierarchy,
            MroError::UnknownBase(id) => Self::UnknownBase(id),
        }
    }
}
