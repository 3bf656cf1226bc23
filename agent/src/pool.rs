//! Bounded worker pool for fan-out probe jobs.
//!
//! A fixed set of workers drains a shared job queue until each receives a
//! shutdown sentinel. The pool knows nothing about what a job means: the
//! caller supplies the processing closure. A job whose closure yields
//! `None` simply produces no result; probe semantics are best-effort, not
//! all-or-nothing.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::errors::AgentError;

/// Run `jobs` through exactly `worker_count` concurrent workers and collect
/// every produced result once all workers have stopped.
///
/// Result order is unspecified and unrelated to job order. Per-job failures
/// (`process` returning `None`) are dropped silently; only failing to stand
/// up the pool itself is an error.
pub async fn run<J, R, F, Fut>(
    jobs: Vec<J>,
    worker_count: usize,
    process: F,
) -> Result<Vec<R>, AgentError>
where
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(J) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send,
{
    if worker_count == 0 {
        return Err(AgentError::PoolError(
            "worker count must be at least 1".to_string(),
        ));
    }

    // Capacity covers every job plus one sentinel per worker, so enqueueing
    // never blocks on a stalled worker.
    let (job_tx, job_rx) = mpsc::channel::<Option<J>>(jobs.len() + worker_count);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<R>();

    // Fixed pool: every worker is up before the first job is enqueued.
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let process = process.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let job = { job_rx.lock().await.recv().await };
                match job {
                    Some(Some(job)) => {
                        if let Some(result) = process(job).await {
                            let _ = result_tx.send(result);
                        }
                    }
                    // Sentinel or closed queue: this worker is done.
                    _ => break,
                }
            }
        }));
    }
    drop(result_tx);

    for job in jobs {
        job_tx
            .send(Some(job))
            .await
            .map_err(|_| AgentError::PoolError("job queue closed early".to_string()))?;
    }
    for _ in 0..worker_count {
        job_tx
            .send(None)
            .await
            .map_err(|_| AgentError::PoolError("job queue closed early".to_string()))?;
    }

    for joined in join_all(workers).await {
        if let Err(e) = joined {
            warn!("Worker task aborted: {}", e);
        }
    }

    let mut results = Vec::new();
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }

    Ok(results)
}
