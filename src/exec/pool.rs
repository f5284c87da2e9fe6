//! A thin capability over a shared `rayon` thread pool.
//!
//! `submit` hands a unit of work to the pool without blocking and returns a
//! handle; `await_all` is the barrier primitive the evaluator builds its
//! level synchronization on. Exactly one of {result, failure} is delivered
//! per handle.

use super::ExecError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static SHARED: OnceLock<Arc<WorkerPool>> = OnceLock::new();

/// A bounded pool of parallel workers.
pub struct WorkerPool {
    inner: rayon::ThreadPool,
}

impl WorkerPool {
    /// Builds a pool with `threads` workers; `0` means the available hardware
    /// parallelism.
    pub fn new(threads: usize) -> Result<Self, ExecError> {
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("arbor-worker-{}", i))
            .build()
            .map_err(|e| ExecError::PoolBuild(e.to_string()))?;
        Ok(Self { inner })
    }

    /// The process-wide pool, built lazily on first use and shared for the
    /// program's lifetime. Callers wanting an isolated or differently sized
    /// pool construct one with [`WorkerPool::new`] and inject it instead.
    pub fn shared() -> Arc<WorkerPool> {
        SHARED
            .get_or_init(|| {
                Arc::new(WorkerPool::new(0).expect("BUG: default worker pool must build"))
            })
            .clone()
    }

    pub fn threads(&self) -> usize {
        self.inner.current_num_threads()
    }

    /// Submits one unit of work. Never blocks; safe for concurrent callers.
    ///
    /// A panic inside `job` is caught on the worker and delivered through the
    /// handle as a failure, so one bad operation body cannot take the shared
    /// pool down.
    pub fn submit<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.inner.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver may be gone if the caller already bailed out;
            // the work is simply discarded then.
            let _ = tx.send(outcome);
        });
        JobHandle { rx }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("threads", &self.threads()).finish()
    }
}

/// Completion handle for one submitted unit of work.
pub struct JobHandle<T> {
    rx: mpsc::Receiver<std::thread::Result<T>>,
}

impl<T> JobHandle<T> {
    /// Blocks until the job has signaled completion or failure.
    pub fn wait(self) -> Result<T, ExecError> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            // Deref through the Box: `&payload` would hand the Box itself to
            // the downcast probes, which only ever match the inner payload.
            Ok(Err(payload)) => Err(ExecError::WorkerPanicked(panic_message(&*payload))),
            Err(mpsc::RecvError) => Err(ExecError::Disconnected),
        }
    }
}

/// Barrier over a wave of handles: blocks until *every* handle has settled,
/// then yields the results in submission order, or the first failure.
///
/// Draining everything before reporting keeps the fail-fast contract honest:
/// the evaluation aborts, but no sibling work is left running against state
/// the caller believes is quiescent.
pub fn await_all<T>(handles: Vec<JobHandle<T>>) -> Result<Vec<T>, ExecError> {
    let total = handles.len();
    let mut results = Vec::with_capacity(total);
    let mut first_error = None;
    for handle in handles {
        match handle.wait() {
            Ok(value) => results.push(value),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    debug!(total, failed = first_error.is_some(), "wave settled");
    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_and_wait() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|| 21 * 2);
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_await_all_preserves_submission_order() {
        let pool = WorkerPool::new(4).unwrap();
        let handles: Vec<_> = (0..32u64)
            .map(|i| {
                pool.submit(move || {
                    // Stagger completions so arrival order differs from
                    // submission order.
                    std::thread::sleep(std::time::Duration::from_millis((32 - i) % 5));
                    i
                })
            })
            .collect();
        let results = await_all(handles).unwrap();
        assert_eq!(results, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_is_surfaced_not_propagated() {
        let pool = WorkerPool::new(2).unwrap();
        let bad = pool.submit(|| -> u32 { panic!("boom") });
        let good = pool.submit(|| 7u32);

        assert_eq!(bad.wait(), Err(ExecError::WorkerPanicked("boom".into())));
        // The pool survives the panic.
        assert_eq!(good.wait().unwrap(), 7);
    }

    #[test]
    fn test_formatted_panic_message_is_preserved() {
        // A `panic!` with arguments carries a `String` payload rather than a
        // `&'static str`; both must come through verbatim.
        let pool = WorkerPool::new(1).unwrap();
        let handle = pool.submit(|| -> u32 { panic!("worker {} failed", 3) });
        assert_eq!(handle.wait(), Err(ExecError::WorkerPanicked("worker 3 failed".into())));
    }

    #[test]
    fn test_await_all_drains_after_failure() {
        let pool = WorkerPool::new(2).unwrap();
        let mut handles = vec![pool.submit(|| -> u32 { panic!("first") })];
        handles.extend((0..8).map(|i| pool.submit(move || i)));
        let err = await_all(handles).unwrap_err();
        assert_eq!(err, ExecError::WorkerPanicked("first".into()));
    }

    #[test]
    fn test_shared_pool_is_one_instance() {
        let a = WorkerPool::shared();
        let b = WorkerPool::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
