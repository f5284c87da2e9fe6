//! The node model: a tree of value leaves and operation nodes, stored in a
//! columnar arena and built either programmatically or from a nested
//! description.

pub mod arena;
pub mod builder;
pub mod types;

pub use arena::NodeKind;
pub use builder::NodeDesc;
pub use types::{ConfigError, NodeId, Pk, Scalar};

use crate::ops::{Operation, OperationRegistry};
use arena::NodeArena;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A computation tree. The shape is immutable once built; evaluation state
/// lives in the evaluator's ledger, never in the tree itself, so one tree
/// can be evaluated repeatedly (or concurrently) without interference.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    store: NodeArena,
}

impl Tree {
    pub fn new() -> Self { Self::default() }

    /// Adds a leaf holding externally supplied per-pk values.
    pub fn add_value(
        &mut self,
        name: &str,
        values: BTreeMap<Pk, Scalar>,
    ) -> Result<NodeId, ConfigError> {
        self.store.add_value(name, values)
    }

    /// Adds an interior node computing `operation` over `children`, and
    /// attaches each child (setting its parent back-reference). Children must
    /// be built before their parent, so the structure is acyclic by
    /// construction.
    pub fn add_operation(
        &mut self,
        name: &str,
        operation: Arc<dyn Operation>,
        children: &[NodeId],
    ) -> Result<NodeId, ConfigError> {
        self.store.add_operation(name, operation, children)
    }

    /// Builds a tree from a nested description, resolving operation names
    /// through `ops`. Returns the tree together with its root id.
    pub fn from_desc(
        desc: &NodeDesc,
        ops: &OperationRegistry,
    ) -> Result<(Tree, NodeId), ConfigError> {
        let mut tree = Tree::new();
        let root = builder::build_into(&mut tree, desc, ops)?;
        Ok((tree, root))
    }

    // --- Accessors ---

    pub fn node_count(&self) -> usize { self.store.count() }

    pub fn name(&self, id: NodeId) -> &str { &self.store.names[id.index()] }

    pub fn kind(&self, id: NodeId) -> &NodeKind { &self.store.kinds[id.index()] }

    pub fn children(&self, id: NodeId) -> &[NodeId] { &self.store.children[id.index()] }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.store.parent[id.index()] }

    /// The unique parentless node, if the arena currently holds exactly one.
    pub fn root(&self) -> Option<NodeId> {
        let mut roots = (0..self.store.count())
            .map(NodeId::new)
            .filter(|id| self.store.parent[id.index()].is_none());
        match (roots.next(), roots.next()) {
            (Some(r), None) => Some(r),
            _ => None,
        }
    }
}
