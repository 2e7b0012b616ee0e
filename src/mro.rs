//! Method resolution order computation using C3 linearization.
//!
//! Two entry points are provided:
//!
//! - [`compute_c3_mro`] computes the nominal MRO of a type from its declared
//!   bases. It is called once per type at declaration time and the result is
//!   cached on the type's node.
//! - [`linearize`] computes the extended MRO used for dispatch composition:
//!   a C3 linearization that additionally splices abstract marker types into
//!   the order at the point where their contract is first satisfied, so that
//!   handlers registered against interfaces a type implements only
//!   structurally still participate in precedence.
//!
//! # Merge rule
//!
//! The C3 merge repeatedly selects the head of the first sequence that does
//! not appear in the tail of any other sequence. If no such head exists the
//! hierarchy is inconsistent and linearization fails.

use crate::graph::{TypeGraph, TypeId};
use smallvec::SmallVec;
use std::fmt;

/// Stack-allocated storage for a linearized precedence order.
/// Most hierarchies are shallow enough to stay inline.
pub type Mro = SmallVec<[TypeId; 8]>;

// =============================================================================
// Errors
// =============================================================================

/// Errors produced while linearizing a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MroError {
    /// No consistent linearization exists for the declared bases.
    InconsistentHierarchy,
    /// A base type id was not resolvable to a node.
    UnknownBase(TypeId),
}

impl fmt::Display for MroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentHierarchy => write!(f, "inconsistent hierarchy"),
            Self::UnknownBase(id) => write!(f, "unknown base type id {}", id.raw()),
        }
    }
}

impl std::error::Error for MroError {}

// =============================================================================
// C3 Merge
// =============================================================================

/// Merge linearization sequences using the C3 selection rule.
///
/// Repeatedly takes the head of the first sequence that does not appear in
/// the tail of any other sequence, removing it from every sequence head it
/// occupies, until all sequences are exhausted.
pub fn c3_merge(mut sequences: Vec<Vec<TypeId>>) -> Result<Mro, MroError> {
    let mut result = Mro::new();
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(result);
        }

        // Find a head that is in no other sequence's tail.
        let mut candidate = None;
        'heads: for seq in &sequences {
            let head = seq[0];
            for other in &sequences {
                if other[1..].contains(&head) {
                    continue 'heads;
                }
            }
            candidate = Some(head);
            break;
        }

        let Some(head) = candidate else {
            return Err(MroError::InconsistentHierarchy);
        };
        result.push(head);
        for seq in &mut sequences {
            if seq[0] == head {
                seq.remove(0);
            }
        }
    }
}

// =============================================================================
// Nominal MRO
// =============================================================================

/// Compute the nominal C3 MRO for a type from its declared bases.
///
/// # Arguments
///
/// * `id` - The type being linearized
/// * `bases` - Its direct bases, in declaration order
/// * `mro_lookup` - Function returning the cached MRO of an already-declared
///   type
///
/// # Returns
///
/// The linearization starting at `id`, or an error if a base is unknown or
/// the hierarchy is inconsistent.
pub fn compute_c3_mro<F>(id: TypeId, bases: &[TypeId], mro_lookup: F) -> Result<Mro, MroError>
where
    F: Fn(TypeId) -> Option<Mro>,
{
    let mut sequences: Vec<Vec<TypeId>> = Vec::with_capacity(bases.len() + 2);
    sequences.push(vec![id]);
    for &base in bases {
        let mro = mro_lookup(base).ok_or(MroError::UnknownBase(base))?;
        sequences.push(mro.to_vec());
    }
    sequences.push(bases.to_vec());
    c3_merge(sequences)
}

// =============================================================================
// Extended Linearization
// =============================================================================

/// Compute the extended C3 MRO of `ty`, splicing in the abstract candidate
/// types from `abcs`.
///
/// A candidate is introduced at the node where its contract first becomes
/// satisfied: `ty` must be a descendant of the candidate while no direct
/// base of `ty` is. Introduced candidates are removed from the set passed to
/// recursive calls so they cannot be reintroduced further down.
///
/// The merge inputs are, in fixed priority order: `[ty]`, the recursive
/// linearizations of the explicit bases, the introduced abstract bases, and
/// the remaining bases, followed by the three raw base lists themselves.
/// Direct bases up to and including the last one carrying an abstract
/// manifest are "explicit"; the rest are "other".
pub fn linearize(graph: &TypeGraph, ty: TypeId, abcs: &[TypeId]) -> Result<Mro, MroError> {
    let bases = graph.bases(ty);

    let mut boundary = 0;
    for (i, &base) in bases.iter().enumerate() {
        if graph.is_abstract(base) {
            boundary = i + 1;
        }
    }
    let explicit_bases = &bases[..boundary];
    let other_bases = &bases[boundary..];

    let mut abstract_bases: Vec<TypeId> = Vec::new();
    for &candidate in abcs {
        if graph.is_subclass(ty, candidate)
            && !bases.iter().any(|&b| graph.is_subclass(b, candidate))
        {
            abstract_bases.push(candidate);
        }
    }
    let reduced: Vec<TypeId> = abcs
        .iter()
        .copied()
        .filter(|c| !abstract_bases.contains(c))
        .collect();

    let mut sequences: Vec<Vec<TypeId>> = Vec::with_capacity(bases.len() + abstract_bases.len() + 4);
    sequences.push(vec![ty]);
    for &base in explicit_bases {
        sequences.push(linearize(graph, base, &reduced)?.to_vec());
    }
    for &base in &abstract_bases {
        sequences.push(linearize(graph, base, &reduced)?.to_vec());
    }
    for &base in other_bases {
        sequences.push(linearize(graph, base, &reduced)?.to_vec());
    }
    sequences.push(explicit_bases.to_vec());
    sequences.push(abstract_bases.clone());
    sequences.push(other_bases.to_vec());
    c3_merge(sequences)
}

// =============================================================================
// Tests
// =============================================================================
