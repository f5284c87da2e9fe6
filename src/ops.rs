//! The operation capability: pure functions combining child results.
//!
//! Operations come in two shapes, matching the two dispatch granularities of
//! the evaluator:
//! - per-pk: `apply` receives one `child name -> scalar` mapping and returns
//!   one scalar;
//! - batched: `apply_batch` receives, for each child name, the full
//!   `pk -> scalar` mapping and returns results for all pks at once.
//!
//! Only `apply` must be implemented; the default `apply_batch` re-partitions
//! the batch per pk and delegates. Plain closures over `&Inputs` are
//! operations via the blanket impl.

use crate::tree::{Pk, Scalar};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// One pk's gathered inputs: child name -> that child's committed value.
pub type Inputs = BTreeMap<String, Scalar>;

/// Batched inputs: child name -> (pk -> that child's committed value).
pub type BatchInputs = BTreeMap<String, BTreeMap<Pk, Scalar>>;

/// Failure reported by a user-supplied operation body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct OpError(pub String);

impl From<&str> for OpError {
    fn from(msg: &str) -> Self { OpError(msg.to_string()) }
}
impl From<String> for OpError {
    fn from(msg: String) -> Self { OpError(msg) }
}

pub trait Operation: Send + Sync {
    /// Computes this node's value for a single pk. The evaluator guarantees
    /// `inputs` holds exactly one entry per child of the node.
    fn apply(&self, inputs: &Inputs) -> Result<Scalar, OpError>;

    /// Computes this node's values for every pk in one call.
    ///
    /// The default re-partitions per pk and calls [`Operation::apply`]; the
    /// result then matches per-pk dispatch exactly. Override when the
    /// operation can amortize work across pks.
    fn apply_batch(&self, inputs: &BatchInputs) -> Result<BTreeMap<Pk, Scalar>, OpError> {
        let mut pks: Vec<&Pk> = Vec::new();
        for per_pk in inputs.values() {
            for pk in per_pk.keys() {
                if !pks.contains(&pk) {
                    pks.push(pk);
                }
            }
        }

        let mut out = BTreeMap::new();
        for pk in pks {
            let mut single: Inputs = BTreeMap::new();
            for (child, per_pk) in inputs {
                if let Some(v) = per_pk.get(pk) {
                    single.insert(child.clone(), v.clone());
                }
            }
            out.insert(pk.clone(), self.apply(&single)?);
        }
        Ok(out)
    }
}

impl<F> Operation for F
where
    F: Fn(&Inputs) -> Result<Scalar, OpError> + Send + Sync,
{
    fn apply(&self, inputs: &Inputs) -> Result<Scalar, OpError> {
        self(inputs)
    }
}

/// Named lookup used when trees are built from serialized descriptions,
/// which reference operations by name rather than by value.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    ops: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registers `op` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: &str, op: Arc<dyn Operation>) {
        self.ops.insert(name.to_string(), op);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.ops.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(inputs: &Inputs) -> Result<Scalar, OpError> {
        let mut total = 0.0;
        for (name, v) in inputs {
            total += v.as_f64().ok_or_else(|| OpError(format!("'{}' is not numeric", name)))?;
        }
        Ok(Scalar::Float(total))
    }

    #[test]
    fn test_default_batch_matches_per_pk() {
        let inputs = BatchInputs::from([
            (
                "a".to_string(),
                BTreeMap::from([
                    ("pk1".to_string(), Scalar::Int(1)),
                    ("pk2".to_string(), Scalar::Int(10)),
                ]),
            ),
            (
                "b".to_string(),
                BTreeMap::from([
                    ("pk1".to_string(), Scalar::Int(2)),
                    ("pk2".to_string(), Scalar::Int(20)),
                ]),
            ),
        ]);

        let out = sum.apply_batch(&inputs).unwrap();
        assert_eq!(out["pk1"], Scalar::Float(3.0));
        assert_eq!(out["pk2"], Scalar::Float(30.0));
    }

    #[test]
    fn test_batch_propagates_op_error() {
        let inputs = BatchInputs::from([(
            "a".to_string(),
            BTreeMap::from([("pk1".to_string(), Scalar::Str("nan".into()))]),
        )]);
        let err = sum.apply_batch(&inputs).unwrap_err();
        assert_eq!(err, OpError("'a' is not numeric".into()));
    }

    #[test]
    fn test_registry_lookup() {
        let mut reg = OperationRegistry::new();
        reg.register("sum", Arc::new(sum));
        assert!(reg.get("sum").is_some());
        assert!(reg.get("missing").is_none());
    }
}
