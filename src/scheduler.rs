//! Bounded worker pool for track jobs
//!
//! All jobs of a batch are queued up front with their sequence numbers already
//! assigned, then `min(concurrency, jobs)` workers drain the shared queue.
//! [`run_batch`] returns once every job has finished.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// A job as handed to a worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchJob<T> {
    /// Caller payload
    pub item: T,
    /// 1-based place in this batch, in submission order
    pub sequence: usize,
    /// Number of jobs in this batch
    pub total: usize,
}

/// Run `process` over `items` with at most `concurrency` jobs in flight
///
/// A panicking job is logged and does not stop the other workers.
pub async fn run_batch<T, F, Fut>(items: Vec<T>, concurrency: usize, process: F)
where
    T: Send + 'static,
    F: Fn(BatchJob<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return;
    }

    let (tx, rx) = mpsc::channel(total);
    for (index, item) in items.into_iter().enumerate() {
        let job = BatchJob {
            item,
            sequence: index + 1,
            total,
        };
        // Capacity equals the number of jobs, so this never waits
        if tx.send(job).await.is_err() {
            break;
        }
    }
    drop(tx);

    let queue = Arc::new(Mutex::new(rx));
    let process = Arc::new(process);
    let workers = concurrency.clamp(1, total);
    tracing::debug!(jobs = total, workers, "starting batch");

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let process = Arc::clone(&process);
        set.spawn(async move {
            loop {
                let next = queue.lock().await.recv().await;
                let Some(job) = next else {
                    break;
                };
                let sequence = job.sequence;
                // Panics stay inside the job task
                if let Err(e) = tokio::spawn(process(job)).await {
                    tracing::error!(error = %e, sequence, "track job terminated abnormally");
                }
            }
        });
    }

    while let Some(result) = set.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "batch worker terminated abnormally");
        }
    }
}
