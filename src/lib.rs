//! Batched, level-synchronized tree computation.
//!
//! A tree's leaves hold externally supplied values and its interior nodes
//! hold pure operations over their children's results. Evaluation runs
//! bottom-up, one breadth-first level per wave, with every independent
//! (node, pk) work item inside a wave dispatched in parallel to a shared
//! worker pool. One tree shape is evaluated for many entities at once: leaf
//! values and results are `pk -> scalar` mappings, so a single traversal is
//! amortized across every subject sharing the shape.
//!
//! ```
//! use arbor_core::{Evaluator, Scalar, Tree};
//! use arbor_core::ops::{Inputs, OpError};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! fn nor_and(inputs: &Inputs) -> Result<Scalar, OpError> {
//!     let a = inputs["antenna_is_tracking"].as_bool().ok_or(OpError::from("not a bool"))?;
//!     let b = inputs["is_modem_online"].as_bool().ok_or(OpError::from("not a bool"))?;
//!     Ok(Scalar::Bool(!(a && b)))
//! }
//!
//! let leaf = |on: [bool; 2]| {
//!     BTreeMap::from([("pk1".to_string(), Scalar::Bool(on[0])),
//!                     ("pk2".to_string(), Scalar::Bool(on[1]))])
//! };
//!
//! let mut tree = Tree::new();
//! let a = tree.add_value("antenna_is_tracking", leaf([true, false]))?;
//! let b = tree.add_value("is_modem_online", leaf([true, false]))?;
//! let root = tree.add_operation("modem_offline", Arc::new(nor_and), &[a, b])?;
//!
//! let result = Evaluator::default().evaluate(&tree, root)?;
//! assert_eq!(result["pk1"], Scalar::Bool(false));
//! assert_eq!(result["pk2"], Scalar::Bool(true));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod eval;
pub mod exec;
pub mod ops;
pub mod tree;

// Re-export key types for convenient access
pub use eval::{EvalError, Evaluator, Granularity, PkValues};
pub use exec::{ExecError, WorkerPool};
pub use ops::{OpError, Operation, OperationRegistry};
pub use tree::{ConfigError, NodeDesc, NodeId, NodeKind, Pk, Scalar, Tree};
