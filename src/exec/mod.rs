//! The work executor: a bounded worker pool with submit / await-all
//! semantics.
pub mod pool;

pub use pool::{await_all, JobHandle, WorkerPool};

use thiserror::Error;

/// Failure of the execution substrate itself, as opposed to a failure of the
/// submitted operation body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("worker disconnected before delivering a result")]
    Disconnected,
}
