//! Bounded-parallelism task pool.
//!
//! Each round spawns its tasks on the tokio runtime behind a fresh semaphore:
//! a task is only spawned once a permit is free, and `run` returns after every
//! task has finished. The pool counts slots, never outcomes; tasks report
//! results through whatever channel they captured.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPool {
    limit: usize,
}

impl TaskPool {
    /// A pool running at most `limit` tasks at once (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task to completion with at most `limit` in flight.
    ///
    /// A panicking task is logged and does not affect the others.
    pub async fn run<I, F>(&self, tasks: I)
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut set = JoinSet::new();

        for task in tasks {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            set.spawn(async move {
                // Released on completion or unwind
                let _permit = permit;
                task.await;
            });

            // Reap finished tasks so a long round does not pile up handles
            while let Some(result) = set.try_join_next() {
                log_join_error(result);
            }
        }

        while let Some(result) = set.join_next().await {
            log_join_error(result);
        }
    }
}

fn log_join_error(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!("Pool task failed: {}", e);
    }
}
