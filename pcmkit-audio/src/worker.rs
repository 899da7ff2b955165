use crate::config::WorkerConfig;
use crate::error::{ConcurrencyError, Error, Operation, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Executor the sessions offload their per-round work to.
///
/// Rounds run on the blocking pool of the wrapped runtime, at most `max_in_flight_rounds` at a
/// time across every session sharing this pool. Continuations (callback delivery and scheduling of
/// the next round) run as regular tasks on the same runtime, so callers never block.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl WorkerPool {
    pub fn new(handle: Handle, config: &WorkerConfig) -> Self {
        let max_in_flight = config.max_in_flight_rounds.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Creates a pool with the default configuration on the runtime of the caller.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current(), &WorkerConfig::default())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Runs `work` on a worker thread once a round permit is available and resumes with its result.
    pub(crate) async fn offload<F, R>(&self, work: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Worker("worker pool closed".to_string()))?;

        self.handle.spawn_blocking(work).await.map_err(|err| {
            tracing::error!(?err, "Worker task failed");
            Error::Worker(err.to_string())
        })
    }
}

/// Single-flight guard, set while a session has a round in flight and cleared on drop.
#[derive(Debug)]
pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>, operation: Operation) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConcurrencyError::Busy(operation))?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_matches};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use test_log::test;

    #[test(tokio::test)]
    async fn offload_returns_result() {
        let pool = WorkerPool::current();
        let result = pool.offload(|| 6 * 7).await;
        assert_matches!(result, Ok(42));
    }

    #[test(tokio::test)]
    async fn offload_reports_panics() {
        let pool = WorkerPool::current();
        let result = pool.offload(|| -> usize { panic!("boom") }).await;
        assert_matches!(result, Err(Error::Worker(_)));
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
    async fn offload_respects_max_in_flight() {
        let pool = WorkerPool::new(
            Handle::current(),
            &WorkerConfig {
                max_in_flight_rounds: 1,
            },
        );
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..4 {
            let pool_clone = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(pool.spawn(async move {
                pool_clone
                    .offload(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_matches!(handle.await.unwrap(), Ok(()));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn busy_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));

        let guard = BusyGuard::try_acquire(&flag, Operation::Formatting).unwrap();
        assert_matches!(
            BusyGuard::try_acquire(&flag, Operation::Formatting),
            Err(Error::Concurrency(ConcurrencyError::Busy(
                Operation::Formatting
            )))
        );

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::try_acquire(&flag, Operation::Formatting).is_ok());
    }
}
