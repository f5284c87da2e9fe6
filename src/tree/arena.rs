//! Columnar arena storage for tree nodes.
//!
//! Ownership flows strictly parent -> children; the parent back-reference is
//! a plain arena index, so no reference counting or interior mutability is
//! needed for the topology itself.

use super::types::{ConfigError, NodeId, Pk, Scalar};
use crate::ops::Operation;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a node *is*: an externally supplied per-pk value mapping, or a pure
/// operation combining its children's per-pk results.
///
/// A node carries exactly one of the two; the enum makes the
/// "both value and operation" misconfiguration unrepresentable once built.
#[derive(Clone)]
pub enum NodeKind {
    Value(BTreeMap<Pk, Scalar>),
    Operation(Arc<dyn Operation>),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Value(v) => f.debug_tuple("Value").field(v).finish(),
            NodeKind::Operation(_) => f.write_str("Operation(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeArena {
    pub kinds: Vec<NodeKind>,
    pub names: Vec<String>,
    pub children: Vec<SmallVec<[NodeId; 4]>>,
    pub parent: Vec<Option<NodeId>>,
}

impl NodeArena {
    pub fn count(&self) -> usize { self.kinds.len() }

    fn push_node(&mut self, kind: NodeKind, name: String) -> NodeId {
        let id = NodeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.names.push(name);
        self.children.push(SmallVec::new());
        self.parent.push(None);
        id
    }

    pub fn add_value(&mut self, name: &str, values: BTreeMap<Pk, Scalar>) -> Result<NodeId, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::EmptyValues { node: name.to_string() });
        }
        Ok(self.push_node(NodeKind::Value(values), name.to_string()))
    }

    pub fn add_operation(
        &mut self,
        name: &str,
        operation: Arc<dyn Operation>,
        children: &[NodeId],
    ) -> Result<NodeId, ConfigError> {
        if children.is_empty() {
            return Err(ConfigError::NoChildren { node: name.to_string() });
        }

        // Sibling names key the parent's accumulator, so they must be unique,
        // and a child with a parent already set would make the graph a DAG.
        for (i, &child) in children.iter().enumerate() {
            if self.parent[child.index()].is_some() {
                return Err(ConfigError::ChildAlreadyAttached {
                    child: self.names[child.index()].clone(),
                });
            }
            if children[..i].iter().any(|&c| self.names[c.index()] == self.names[child.index()]) {
                return Err(ConfigError::DuplicateChildName {
                    node: name.to_string(),
                    child: self.names[child.index()].clone(),
                });
            }
        }

        let id = self.push_node(NodeKind::Operation(operation), name.to_string());
        self.children[id.index()].extend_from_slice(children);
        for &child in children {
            self.parent[child.index()] = Some(id);
        }
        Ok(id)
    }
}
