//! Explicit type graph backing dispatch resolution.
//!
//! The original host exposes a live, dynamically queryable class hierarchy;
//! here every type is a node in an explicit rooted DAG, declared up front:
//!
//! ```text
//! TypeNode
//! ├── name: Arc<str>
//! ├── bases: SmallVec<TypeId; 2> (declaration order, defaults to [OBJECT])
//! ├── mro: SmallVec<TypeId; 8> (nominal C3 MRO, cached at declaration)
//! ├── flags: TypeFlags (abstract manifest)
//! ├── subclasses: Vec<TypeId> (direct nominal subclasses)
//! └── implements: SmallVec<TypeId; 2> (virtual implementation edges)
//! ```
//!
//! Structural interface satisfaction is a declared relationship: recording
//! that a type implements an abstract marker adds a virtual edge and bumps
//! the process-wide cache token, because the registration can retroactively
//! change which types count as descendants of the marker.
//!
//! # Thread Safety
//!
//! The node table is behind a `parking_lot::RwLock`; queries take a read
//! lock, declarations a write lock. Identity allocation is monotonic and
//! doubles as the deterministic total order used wherever the original
//! relied on insertion order.

use crate::dispatch::token;
use crate::error::DispatchError;
use crate::mro::{Mro, MroError, compute_c3_mro};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

// =============================================================================
// Type Identity
// =============================================================================

/// Dense identifier of a type in a [`TypeGraph`].
///
/// Ids are allocated in declaration order and are totally ordered; the
/// ordering is used as the deterministic tie-break throughout resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// The universal root type; an ancestor of every type and always the
    /// default registration target.
    pub const OBJECT: TypeId = TypeId(0);

    /// Construct from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Type Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing a type's capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u32 {
        /// Type carries an abstract-method manifest, either declared
        /// directly or inherited nominally from an abstract base.
        const ABSTRACT = 1 << 0;
    }
}

impl Default for TypeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Type Node
// =============================================================================

/// Stack-allocated storage for direct bases. Most types have 1-2 bases.
pub type Bases = SmallVec<[TypeId; 2]>;

#[derive(Debug)]
struct TypeNode {
    name: Arc<str>,
    bases: Bases,
    /// Nominal MRO, computed once at declaration.
    mro: Mro,
    flags: TypeFlags,
    /// Direct nominal subclasses, in declaration order.
    subclasses: Vec<TypeId>,
    /// Abstract markers this type implements virtually.
    implements: SmallVec<[TypeId; 2]>,
}

// =============================================================================
// Type Graph
// =============================================================================

/// The rooted DAG of declared types.
///
/// Created with the root type already present. Declarations validate their
/// bases and cache the nominal MRO eagerly, so later queries cannot fail.
pub struct TypeGraph {
    nodes: RwLock<Vec<TypeNode>>,
}

impl TypeGraph {
    /// Create a graph containing only the root type.
    pub fn new() -> Self {
        let root = TypeNode {
            name: Arc::from("object"),
            bases: Bases::new(),
            mro: smallvec![TypeId::OBJECT],
            flags: TypeFlags::empty(),
            subclasses: Vec::new(),
            implements: SmallVec::new(),
        };
        Self {
            nodes: RwLock::new(vec![root]),
        }
    }

    /// Declare a concrete type with the given direct bases.
    ///
    /// An empty base list means the type derives from the root. The abstract
    /// manifest is inherited: a type declared on top of an abstract base
    /// carries the manifest too.
    pub fn declare(&self, name: &str, bases: &[TypeId]) -> Result<TypeId, MroError> {
        self.declare_with_flags(name, bases, TypeFlags::empty())
    }

    /// Declare an abstract marker type.
    pub fn declare_abstract(&self, name: &str, bases: &[TypeId]) -> Result<TypeId, MroError> {
        self.declare_with_flags(name, bases, TypeFlags::ABSTRACT)
    }

    fn declare_with_flags(
        &self,
        name: &str,
        bases: &[TypeId],
        mut flags: TypeFlags,
    ) -> Result<TypeId, MroError> {
        let mut nodes = self.nodes.write();

        let bases: Bases = if bases.is_empty() {
            smallvec![TypeId::OBJECT]
        } else {
            bases.iter().copied().collect()
        };
        for &base in &bases {
            if base.index() >= nodes.len() {
                return Err(MroError::UnknownBase(base));
            }
            if nodes[base.index()].flags.contains(TypeFlags::ABSTRACT) {
                flags |= TypeFlags::ABSTRACT;
            }
        }

        let id = TypeId(nodes.len() as u32);
        let mro = compute_c3_mro(id, &bases, |b| {
            nodes.get(b.index()).map(|n| n.mro.clone())
        })?;

        for &base in &bases {
            nodes[base.index()].subclasses.push(id);
        }
        nodes.push(TypeNode {
            name: Arc::from(name),
            bases,
            mro,
            flags,
            subclasses: Vec::new(),
            implements: SmallVec::new(),
        });
        Ok(id)
    }

    /// Record that `ty` implements the abstract `marker` without inheriting
    /// from it nominally.
    ///
    /// A no-op when `ty` is already a descendant of `marker`. Otherwise the
    /// virtual edge is added and the process-wide cache token is bumped so
    /// that every dispatch cache re-validates on its next lookup.
    pub fn implement(&self, ty: TypeId, marker: TypeId) -> Result<(), DispatchError> {
        if !self.contains(ty) {
            return Err(DispatchError::UnknownType(ty));
        }
        if !self.contains(marker) {
            return Err(DispatchError::UnknownType(marker));
        }
        if !self.is_abstract(marker) {
            return Err(DispatchError::NotAbstract(marker));
        }
        if self.is_subclass(ty, marker) {
            return Ok(());
        }
        if self.is_subclass(marker, ty) {
            return Err(DispatchError::InheritanceCycle {
                subclass: self.name(ty),
                marker: self.name(marker),
            });
        }
        self.nodes.write()[ty.index()].implements.push(marker);
        token::bump();
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check whether an id resolves to a declared type.
    #[inline]
    pub fn contains(&self, ty: TypeId) -> bool {
        ty.index() < self.nodes.read().len()
    }

    /// Number of declared types (the root included).
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Check if the graph holds only the root.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Get a type's name.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not in this graph.
    pub fn name(&self, ty: TypeId) -> Arc<str> {
        self.nodes.read()[ty.index()].name.clone()
    }

    /// Get a type's direct bases, in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not in this graph.
    pub fn bases(&self, ty: TypeId) -> Bases {
        self.nodes.read()[ty.index()].bases.clone()
    }

    /// Get a type's cached nominal MRO.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not in this graph.
    pub fn mro(&self, ty: TypeId) -> Mro {
        self.nodes.read()[ty.index()].mro.clone()
    }

    /// Get a type's direct nominal subclasses, in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not in this graph.
    pub fn direct_subclasses(&self, ty: TypeId) -> Vec<TypeId> {
        self.nodes.read()[ty.index()].subclasses.clone()
    }

    /// Check whether a type carries an abstract manifest.
    ///
    /// False for ids not in the graph.
    #[inline]
    pub fn is_abstract(&self, ty: TypeId) -> bool {
        self.nodes
            .read()
            .get(ty.index())
            .is_some_and(|n| n.flags.contains(TypeFlags::ABSTRACT))
    }

    /// Check whether `a` is `b` or a descendant of `b`.
    ///
    /// Descent is reachability over the union of nominal base edges and
    /// virtual implementation edges, so a type registered as implementing a
    /// marker is a subclass of the marker and of the marker's own ancestors.
    pub fn is_subclass(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let nodes = self.nodes.read();
        if a.index() >= nodes.len() || b.index() >= nodes.len() {
            return false;
        }
        if b == TypeId::OBJECT {
            return true;
        }

        let mut seen = FxHashSet::default();
        let mut stack: SmallVec<[TypeId; 8]> = smallvec![a];
        seen.insert(a);
        while let Some(current) = stack.pop() {
            if current == b {
                return true;
            }
            let node = &nodes[current.index()];
            for &next in node.bases.iter().chain(node.implements.iter()) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeGraph")
            .field("types", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_graph_has_root() {
        let graph = TypeGraph::new();
        assert!(graph.contains(TypeId::OBJECT));
        assert!(graph.is_empty());
        assert_eq!(&*graph.name(TypeId::OBJECT), "object");
        assert_eq!(graph.mro(TypeId::OBJECT).as_slice(), &[TypeId::OBJECT]);
    }

    #[test]
    fn test_declare_defaults_to_root_base() {
        let graph = TypeGraph::new();
        let a = graph.declare("A", &[]).unwrap();
        assert_eq!(graph.bases(a).as_slice(), &[TypeId::OBJECT]);
        assert_eq!(graph.mro(a).as_slice(), &[a, TypeId::OBJECT]);
        assert!(graph.direct_subclasses(TypeId::OBJECT).contains(&a));
    }

    #[test]
    fn test_declare_unknown_base() {
        let graph = TypeGraph::new();
        let bogus = TypeId::from_raw(42);
        assert_eq!(
            graph.declare("A", &[bogus]).unwrap_err(),
            MroError::UnknownBase(bogus)
        );
    }

    #[test]
    fn test_abstract_manifest_is_inherited() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let sub = graph.declare("Sub", &[marker]).unwrap();
        let plain = graph.declare("Plain", &[]).unwrap();

        assert!(graph.is_abstract(marker));
        assert!(graph.is_abstract(sub));
        assert!(!graph.is_abstract(plain));
    }

    #[test]
    fn test_everything_descends_from_root() {
        let graph = TypeGraph::new();
        let a = graph.declare("A", &[]).unwrap();
        let b = graph.declare("B", &[a]).unwrap();
        assert!(graph.is_subclass(a, TypeId::OBJECT));
        assert!(graph.is_subclass(b, TypeId::OBJECT));
        assert!(!graph.is_subclass(TypeId::OBJECT, a));
    }

    #[test]
    fn test_is_subclass_nominal() {
        let graph = TypeGraph::new();
        let a = graph.declare("A", &[]).unwrap();
        let b = graph.declare("B", &[a]).unwrap();
        let c = graph.declare("C", &[b]).unwrap();
        assert!(graph.is_subclass(c, a));
        assert!(!graph.is_subclass(a, c));
    }

    #[test]
    fn test_implement_records_virtual_descent() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let concrete = graph.declare("Concrete", &[]).unwrap();

        assert!(!graph.is_subclass(concrete, marker));
        graph.implement(concrete, marker).unwrap();
        assert!(graph.is_subclass(concrete, marker));
    }

    #[test]
    fn test_implement_is_transitive_through_markers() {
        // Implementing a derived marker makes the implementor a descendant
        // of the marker's own bases as well.
        let graph = TypeGraph::new();
        let upper = graph.declare_abstract("Upper", &[]).unwrap();
        let lower = graph.declare_abstract("Lower", &[upper]).unwrap();
        let concrete = graph.declare("Concrete", &[]).unwrap();
        graph.implement(concrete, lower).unwrap();

        assert!(graph.is_subclass(concrete, upper));
    }

    #[test]
    fn test_implement_descendants_inherit_edge() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let base = graph.declare("Base", &[]).unwrap();
        let derived = graph.declare("Derived", &[base]).unwrap();
        graph.implement(base, marker).unwrap();

        assert!(graph.is_subclass(derived, marker));
    }

    #[test]
    fn test_implement_requires_abstract_marker() {
        let graph = TypeGraph::new();
        let plain = graph.declare("Plain", &[]).unwrap();
        let other = graph.declare("Other", &[]).unwrap();
        assert_eq!(
            graph.implement(other, plain).unwrap_err(),
            DispatchError::NotAbstract(plain)
        );
    }

    #[test]
    fn test_implement_rejects_cycle() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let sub = graph.declare_abstract("Sub", &[marker]).unwrap();
        let err = graph.implement(marker, sub).unwrap_err();
        assert!(matches!(err, DispatchError::InheritanceCycle { .. }));
    }

    #[test]
    fn test_implement_existing_subclass_is_noop() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let sub = graph.declare("Sub", &[marker]).unwrap();

        graph.implement(sub, marker).unwrap();
        graph.implement(sub, marker).unwrap();
        assert!(graph.is_subclass(sub, marker));
    }

    #[test]
    fn test_implement_bumps_token() {
        let graph = TypeGraph::new();
        let marker = graph.declare_abstract("Marker", &[]).unwrap();
        let concrete = graph.declare("Concrete", &[]).unwrap();

        let before = token::current();
        graph.implement(concrete, marker).unwrap();
        assert!(token::current() > before);
    }

    #[test]
    fn test_type_id_ordering_follows_declaration() {
        let graph = TypeGraph::new();
        let a = graph.declare("A", &[]).unwrap();
        let b = graph.declare("B", &[]).unwrap();
        assert!(a < b);
    }
}
