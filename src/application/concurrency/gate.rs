use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Bounded-parallel execution of embedding batches (spec §4.H).
///
/// Failure of one batch never cancels siblings. Cancellation propagates to
/// all in-flight batches through a shared `CancellationToken`; `run_all`
/// drains in-flight work before returning (spec §5).
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    cancellation: CancellationToken,
}

impl ConcurrencyGate {
    pub fn new(max_concurrency: usize, cancellation: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            cancellation,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs every task with at most `max_concurrency` in flight. Each task
    /// returns `Result<T, E>`; a failing task does not stop the others —
    /// results are returned in the order tasks were submitted, not
    /// completion order (the caller may reorder as needed; per spec §4.H/§5
    /// completion events themselves are unordered).
    pub async fn run_all<F, Fut, T, E>(&self, tasks: Vec<F>) -> Vec<Result<T, E>>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let futures = tasks.into_iter().map(|task| {
            let semaphore = self.semaphore.clone();
            let cancellation = self.cancellation.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                task(cancellation).await
            }
        });
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_all_tasks_and_collects_results_in_submission_order() {
        let gate = ConcurrencyGate::new(2, CancellationToken::new());
        let tasks: Vec<_> = (0..5)
            .map(|i| {
                move |_: CancellationToken| async move { Ok::<usize, ()>(i) }
            })
            .collect();
        let results = gate.run_all(tasks).await;
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn one_failure_does_not_prevent_siblings_from_completing() {
        let gate = ConcurrencyGate::new(4, CancellationToken::new());
        let completed = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let completed = completed.clone();
                move |_: CancellationToken| {
                    let completed = completed.clone();
                    async move {
                        if i == 2 {
                            return Err::<(), &'static str>("boom");
                        }
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
            })
            .collect();
        let results = gate.run_all(tasks).await;
        assert_eq!(completed.load(Ordering::SeqCst), 3);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn cancellation_token_is_shared_and_observable() {
        let gate = ConcurrencyGate::new(1, CancellationToken::new());
        gate.cancellation_token().cancel();
        assert!(gate.is_cancelled());
    }
}
