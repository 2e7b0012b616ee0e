//! Dispatch resolution: composing the effective precedence order for a
//! runtime type against a registry and picking the most specific handler.
//!
//! Resolution is a two-step slow path, memoized by the caller:
//!
//! 1. [`compose_mro`] builds the precedence order actually used for
//!    dispatch. Registered types that the runtime type satisfies only
//!    structurally are spliced into its linearization; registered types that
//!    are already on the nominal chain, unrelated, or shadowed by a more
//!    derived registered entry are dropped first.
//! 2. [`find_impl`] scans that order and returns the first registered entry,
//!    with a one-step lookahead that refuses to guess between two unrelated,
//!    equally specific interface matches.

use crate::dispatch::registry::{Overload, Registry};
use crate::error::DispatchError;
use crate::graph::{TypeGraph, TypeId};
use crate::mro::{Mro, MroError, linearize};

// =============================================================================
// Composed MRO
// =============================================================================

/// Compute the precedence order for `ty` given the candidate `types` (a
/// registry's keys).
///
/// Candidates already on `ty`'s nominal MRO need no splicing; candidates
/// `ty` does not descend from are irrelevant; candidates that are strict
/// bases of another surviving candidate will enter the order through it.
/// For each survivor, registered subclasses of it that `ty` also implements
/// are preferred, richest first (most candidate-set ancestors), which
/// stabilizes the relative order of unrelated interfaces implemented by the
/// same concrete type. The survivors are then spliced by
/// [`linearize`](crate::mro::linearize).
pub fn compose_mro(
    graph: &TypeGraph,
    ty: TypeId,
    types: &[TypeId],
) -> Result<Mro, MroError> {
    let nominal = graph.mro(ty);

    let related: Vec<TypeId> = types
        .iter()
        .copied()
        .filter(|&t| !nominal.contains(&t) && graph.contains(t) && graph.is_subclass(ty, t))
        .collect();

    // Entries that are strict bases of other entries end up in the order
    // through their subclass.
    let candidates: Vec<TypeId> = related
        .iter()
        .copied()
        .filter(|&t| {
            !related
                .iter()
                .any(|&other| other != t && graph.mro(other).contains(&t))
        })
        .collect();

    let mut abcs: Vec<TypeId> = Vec::new();
    for &candidate in &candidates {
        let mut found: Vec<Vec<TypeId>> = Vec::new();
        for sub in graph.direct_subclasses(candidate) {
            if !nominal.contains(&sub) && graph.is_subclass(ty, sub) {
                found.push(
                    graph
                        .mro(sub)
                        .iter()
                        .copied()
                        .filter(|s| candidates.contains(s))
                        .collect(),
                );
            }
        }
        if found.is_empty() {
            abcs.push(candidate);
            continue;
        }
        // Favor subclasses with the biggest number of useful ancestors.
        found.sort_by_key(|useful| std::cmp::Reverse(useful.len()));
        for useful in found {
            for sub in useful {
                if !abcs.contains(&sub) {
                    abcs.push(sub);
                }
            }
        }
    }

    linearize(graph, ty, &abcs)
}

// =============================================================================
// Handler Lookup
// =============================================================================

/// Return the best matching registry entry for `ty`.
///
/// Scans the composed precedence order and takes the first registered type.
/// Before accepting a match that is not on `ty`'s nominal chain, the next
/// entry in the order is inspected: if it is also registered, also off the
/// nominal chain, and the match is not one of its descendants, the two are
/// unrelated interface matches of equal standing and dispatch is ambiguous.
///
/// Never fails to match for a well-formed registry: the root entry is the
/// terminal fallback.
pub fn find_impl<'r, H>(
    graph: &TypeGraph,
    registry: &'r Registry<H>,
    ty: TypeId,
) -> Result<&'r Overload<H>, DispatchError> {
    let composed = compose_mro(graph, ty, &registry.keys_sorted())?;
    let nominal = graph.mro(ty);

    let mut found: Option<TypeId> = None;
    for &t in composed.iter() {
        if let Some(m) = found {
            if registry.contains(t)
                && !nominal.contains(&t)
                && !nominal.contains(&m)
                && !graph.is_subclass(m, t)
            {
                return Err(DispatchError::AmbiguousDispatch {
                    first: graph.name(m),
                    second: graph.name(t),
                });
            }
            break;
        }
        if registry.contains(t) {
            found = Some(t);
        }
    }

    let best = found.unwrap_or(TypeId::OBJECT);
    registry
        .get(best)
        .ok_or(DispatchError::UnknownType(best))
}

// =============================================================================
// Tests
// =============================================================================
