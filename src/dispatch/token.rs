//! Process-wide cache invalidation token.
//!
//! Virtual implementation of an abstract marker is a late-binding, global
//! operation: it can retroactively change which concrete types count as
//! descendants of the marker, invalidating dispatch results computed before
//! the edge existed. Every dispatch cache that holds at least one abstract
//! key stores the token version it was filled under and re-validates against
//! the current version before trusting a memo.
//!
//! The token starts at version 0 and is bumped only by
//! [`TypeGraph::implement`](crate::graph::TypeGraph::implement).

use std::sync::atomic::{AtomicU64, Ordering};

static TOKEN: AtomicU64 = AtomicU64::new(0);

/// Current token version.
#[inline]
pub fn current() -> u64 {
    TOKEN.load(Ordering::Acquire)
}

/// Advance the token, invalidating every cache that consults it.
///
/// Returns the new version.
pub fn bump() -> u64 {
    TOKEN.fetch_add(1, Ordering::AcqRel) + 1
}
