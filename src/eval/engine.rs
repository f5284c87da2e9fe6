//! The level-synchronized evaluator.
//!
//! Levels are processed deepest first. Inside a level, every (node, pk) work
//! item is independent, so the whole wave is submitted to the worker pool at
//! once and barrier-waited; results are committed and propagated into parent
//! accumulators on the driving thread after the barrier. Committing per level
//! (not per node) is what guarantees an operation's inputs are complete even
//! when its children sit atop subtrees of different depth.

use super::ledger::{EvalError, Ledger, PkValues};
use crate::analysis;
use crate::exec::{self, WorkerPool};
use crate::ops::{BatchInputs, OpError, OperationRegistry};
use crate::tree::{NodeDesc, NodeId, NodeKind, Pk, Scalar, Tree};
use std::sync::Arc;
use tracing::debug;

/// The unit of parallel fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// One work item per (node, pk): maximal parallelism, one pool dispatch
    /// per entity. The default.
    #[default]
    PerPk,
    /// One work item per node, covering all pks in a single batched call:
    /// fewer dispatches, coarser parallelism.
    PerNode,
}

/// Drives a tree bottom-up through the worker pool, one level per wave.
///
/// Holds no per-evaluation state; cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct Evaluator {
    pool: Arc<WorkerPool>,
    granularity: Granularity,
}

impl Default for Evaluator {
    /// An evaluator on the process-wide shared pool.
    fn default() -> Self {
        Self::new(WorkerPool::shared())
    }
}

impl Evaluator {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool, granularity: Granularity::default() }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Evaluates the subtree under `root` and returns the root's per-pk
    /// values. Synchronous: blocks until the whole tree has settled.
    pub fn evaluate(&self, tree: &Tree, root: NodeId) -> Result<PkValues, EvalError> {
        let levels = analysis::compute_levels(tree, root);
        self.evaluate_with_levels(tree, root, &levels)
    }

    /// As [`Evaluator::evaluate`], reusing a level partition previously
    /// computed for this `(tree, root)` pair.
    pub fn evaluate_with_levels(
        &self,
        tree: &Tree,
        root: NodeId,
        levels: &[Vec<NodeId>],
    ) -> Result<PkValues, EvalError> {
        let mut ledger = Ledger::for_tree(tree);

        // Deepest level first; the root's level runs last.
        for (depth, level) in levels.iter().enumerate().rev() {
            self.propagate_leaves(tree, level, &mut ledger);
            let committed = match self.granularity {
                Granularity::PerPk => self.run_wave_per_pk(tree, level, &mut ledger)?,
                Granularity::PerNode => self.run_wave_per_node(tree, level, &mut ledger)?,
            };
            debug!(depth, nodes = level.len(), committed, "level settled");
        }

        Ok(match tree.kind(root) {
            NodeKind::Value(values) => values.clone(),
            NodeKind::Operation(_) => ledger.take_values(root),
        })
    }

    /// Builds a tree from `desc` and evaluates it in one call.
    pub fn evaluate_desc(
        &self,
        desc: &NodeDesc,
        ops: &OperationRegistry,
    ) -> Result<PkValues, EvalError> {
        let (tree, root) = Tree::from_desc(desc, ops)?;
        self.evaluate(&tree, root)
    }

    /// Asynchronous form: returns immediately and invokes `on_complete` with
    /// the outcome once the whole tree has settled.
    ///
    /// The evaluation is driven from a dedicated thread rather than a pool
    /// worker, so even a single-worker pool cannot deadlock on the barrier.
    pub fn evaluate_async<F>(&self, tree: Arc<Tree>, root: NodeId, on_complete: F)
    where
        F: FnOnce(Result<PkValues, EvalError>) + Send + 'static,
    {
        let evaluator = self.clone();
        std::thread::Builder::new()
            .name("arbor-eval-driver".to_string())
            .spawn(move || on_complete(evaluator.evaluate(&tree, root)))
            .expect("BUG: evaluation driver thread must spawn");
    }

    /// Leaf propagation is synchronous and in-process: value nodes never
    /// touch the pool, they just seed their parent's accumulator.
    fn propagate_leaves(&self, tree: &Tree, level: &[NodeId], ledger: &mut Ledger) {
        for &node in level {
            let NodeKind::Value(values) = tree.kind(node) else { continue };
            let Some(parent) = tree.parent(node) else { continue };
            for (pk, value) in values {
                ledger.accumulate(parent, pk, tree.name(node), value.clone());
            }
        }
    }

    /// Commits a computed value and immediately forwards it into the parent's
    /// accumulator, making the parent ready by the time its level runs.
    fn commit(&self, tree: &Tree, ledger: &mut Ledger, node: NodeId, pk: Pk, value: Scalar) {
        if let Some(parent) = tree.parent(node) {
            ledger.accumulate(parent, &pk, tree.name(node), value.clone());
        }
        ledger.commit(node, pk, value);
    }

    /// Dispatches one level at (node, pk) granularity and barrier-waits.
    /// Returns the number of committed results.
    fn run_wave_per_pk(
        &self,
        tree: &Tree,
        level: &[NodeId],
        ledger: &mut Ledger,
    ) -> Result<usize, EvalError> {
        struct Done {
            node: NodeId,
            pk: Pk,
            result: Result<Scalar, OpError>,
        }

        let mut handles = Vec::new();
        for &node in level {
            let NodeKind::Operation(op) = tree.kind(node) else { continue };
            let expected = tree.children(node).len();
            for (pk, inputs) in ledger.take_accumulated(node) {
                if inputs.len() != expected {
                    return Err(EvalError::MissingInput {
                        node: tree.name(node).to_string(),
                        pk,
                        got: inputs.len(),
                        expected,
                    });
                }
                let op = Arc::clone(op);
                handles.push(self.pool.submit(move || {
                    let result = op.apply(&inputs);
                    Done { node, pk, result }
                }));
            }
        }

        // Barrier: nothing shallower may start until the whole wave is in.
        let outcomes = exec::await_all(handles)?;
        let committed = outcomes.len();
        for done in outcomes {
            let value = done.result.map_err(|source| EvalError::OperationFailure {
                node: tree.name(done.node).to_string(),
                pk: Some(done.pk.clone()),
                source,
            })?;
            self.commit(tree, ledger, done.node, done.pk, value);
        }
        Ok(committed)
    }

    /// Dispatches one level at node granularity: one batched work item per
    /// operation node, covering every pk in its accumulator.
    fn run_wave_per_node(
        &self,
        tree: &Tree,
        level: &[NodeId],
        ledger: &mut Ledger,
    ) -> Result<usize, EvalError> {
        struct Done {
            node: NodeId,
            result: Result<PkValues, OpError>,
        }

        let mut handles = Vec::new();
        for &node in level {
            let NodeKind::Operation(op) = tree.kind(node) else { continue };
            let expected = tree.children(node).len();
            let accumulated = ledger.take_accumulated(node);
            if accumulated.is_empty() {
                // Nothing ever fed this node; it contributes nothing.
                continue;
            }

            // Completeness is checked per pk up front, exactly as in per-pk
            // dispatch, then the accumulator is transposed to child-major.
            let mut batch = BatchInputs::new();
            for (pk, inputs) in accumulated {
                if inputs.len() != expected {
                    return Err(EvalError::MissingInput {
                        node: tree.name(node).to_string(),
                        pk,
                        got: inputs.len(),
                        expected,
                    });
                }
                for (child, value) in inputs {
                    batch.entry(child).or_default().insert(pk.clone(), value);
                }
            }

            let op = Arc::clone(op);
            handles.push(self.pool.submit(move || {
                let result = op.apply_batch(&batch);
                Done { node, result }
            }));
        }

        let outcomes = exec::await_all(handles)?;
        let mut committed = 0;
        for done in outcomes {
            let values = done.result.map_err(|source| EvalError::OperationFailure {
                node: tree.name(done.node).to_string(),
                pk: None,
                source,
            })?;
            committed += values.len();
            for (pk, value) in values {
                self.commit(tree, ledger, done.node, pk, value);
            }
        }
        Ok(committed)
    }
}
