//! Evaluation state, kept outside the tree.
//!
//! The tree is an immutable skeleton; everything an evaluation writes lives
//! here, densely indexed by `NodeId`. Each `evaluate` call starts from a
//! fresh ledger, so repeated evaluation of one tree instance can never
//! observe stale accumulator entries from a previous run.

use crate::exec::ExecError;
use crate::ops::OpError;
use crate::tree::{ConfigError, NodeId, Pk, Scalar, Tree};
use std::collections::BTreeMap;
use thiserror::Error;

/// The final (and intermediate) result shape: one scalar per primary key.
pub type PkValues = BTreeMap<Pk, Scalar>;

/// Fatal evaluation failure. No partial result is ever returned and nothing
/// is retried; the caller re-invokes evaluation after fixing inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// An operation was asked to fire for a pk for which not every child has
    /// contributed a value: the sibling leaves' pk sets disagree.
    #[error("node '{node}' has {got} of {expected} child values for pk '{pk}'")]
    MissingInput { node: String, pk: Pk, got: usize, expected: usize },
    /// The user-supplied operation body failed. `pk` is absent for batched
    /// dispatch, where one work item covers every pk at once.
    #[error("operation node '{node}' failed for pk '{pk_disp}': {source}", pk_disp = .pk.as_deref().unwrap_or("*"))]
    OperationFailure {
        node: String,
        pk: Option<Pk>,
        #[source]
        source: OpError,
    },
    #[error(transparent)]
    Executor(#[from] ExecError),
}

/// Per-evaluation scratch and result storage.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Latest computed (or propagated) value per (node, pk).
    values: Vec<PkValues>,
    /// Fan-in scratch: per node, per pk, child name -> committed value.
    /// Consumed once when the node's level fires.
    accumulated: Vec<BTreeMap<Pk, BTreeMap<String, Scalar>>>,
}

impl Ledger {
    pub fn for_tree(tree: &Tree) -> Self {
        let count = tree.node_count();
        Self {
            values: vec![PkValues::new(); count],
            accumulated: vec![BTreeMap::new(); count],
        }
    }

    /// Records one child's contribution toward `node`'s inputs for `pk`.
    pub fn accumulate(&mut self, node: NodeId, pk: &Pk, child: &str, value: Scalar) {
        self.accumulated[node.index()]
            .entry(pk.clone())
            .or_default()
            .insert(child.to_string(), value);
    }

    /// Takes `node`'s accumulator, leaving it empty.
    pub fn take_accumulated(&mut self, node: NodeId) -> BTreeMap<Pk, BTreeMap<String, Scalar>> {
        std::mem::take(&mut self.accumulated[node.index()])
    }

    /// Stores `node`'s computed value for `pk`.
    pub fn commit(&mut self, node: NodeId, pk: Pk, value: Scalar) {
        self.values[node.index()].insert(pk, value);
    }

    pub fn values(&self, node: NodeId) -> &PkValues {
        &self.values[node.index()]
    }

    pub fn take_values(&mut self, node: NodeId) -> PkValues {
        std::mem::take(&mut self.values[node.index()])
    }
}
