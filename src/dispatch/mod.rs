//! Dispatch engine: overload registries, resolution, and memoization.
//!
//! The resolution slow path composes a precedence order for the runtime
//! type ([`resolve::compose_mro`]), scans it for the most specific
//! registered handler ([`resolve::find_impl`]), and memoizes the result in
//! the owning [`GenericFn`]'s cache. Registries holding abstract keys
//! additionally validate their memos against the process-wide
//! [`token`] version, because virtual implementation edges can change
//! resolution results after the fact.

pub mod generic;
pub mod registry;
pub mod resolve;
pub mod token;

pub use generic::GenericFn;
pub use registry::{HandlerDecl, Overload, Registry};
pub use resolve::{compose_mro, find_impl};
