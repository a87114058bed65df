//! Bounded worker pool for write-behind persistence. A fixed number of
//! `core` long-lived tasks drain a bounded channel; `max` is the overall
//! concurrency cap, enforced by a semaphore so a burst of submissions can
//! still run beyond `core` without the queue itself growing unbounded.
//!
//! A submission to a full queue is rejected rather than blocking the
//! caller — queue-full backpressure is implementation-defined
//! but must be observable.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::warn;

use crate::config::WorkerPoolConfig;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded pool of workers executing write-behind persistence jobs.
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
}

impl WorkerPool {
    /// Spawns `config.core` dispatcher loops sharing a bounded channel and
    /// a `config.max`-permit semaphore gating actual job execution.
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let semaphore = Arc::new(Semaphore::new(config.max.max(1)));

        for worker_id in 0..config.core.max(1) {
            let rx = rx.clone();
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };
                    let permit = semaphore.clone().acquire_owned().await;
                    tokio::spawn(async move {
                        let _permit = permit;
                        job.await;
                    });
                    tracing::trace!(worker_id, "write-behind job dispatched");
                }
            });
        }

        Self { tx }
    }

    /// Submits a job. Returns `false` without running it if the queue is
    /// full, so the caller (the push engine) can record the rejection.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.tx.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("write-behind worker pool queue full, rejecting submission");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("write-behind worker pool is shut down, rejecting submission");
                false
            }
        }
    }
}
