//! Bounded pool of named, cancellable long-running tasks

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, Instrument};

use crate::{CoreError, Result};

/// WorkerPool runs at most `capacity` tasks at once. Every task receives a
/// child of the pool's cancellation token; closing the pool cancels them all
/// and waits until each has returned.
pub struct WorkerPool {
    capacity: usize,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of submitted tasks that have not yet returned
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Spawn a named task. It starts once a slot is free and is handed a
    /// token that fires when the pool is closed. Every accepted task runs,
    /// even when the pool is closed before it gets a slot.
    pub fn submit<F, Fut>(&self, name: &'static str, task: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(CoreError::PoolClosed);
        }

        let slots = Arc::clone(&self.slots);
        let token = self.shutdown.child_token();
        let span = tracing::info_span!("task", name);

        self.tracker.spawn(
            async move {
                // a closed pool still runs every submitted task; the task
                // sees its token already cancelled
                let Ok(_permit) = slots.acquire_owned().await else {
                    return;
                };

                debug!("Task {} started", name);
                match task(token).await {
                    Ok(()) => debug!("Task {} finished", name),
                    Err(e) => error!("Task {} failed: {:#}", name, e),
                }
            }
            .instrument(span),
        );

        Ok(())
    }

    /// Cancel every task and wait for all of them to return
    pub async fn close(&self) {
        self.tracker.close();
        self.shutdown.cancel();
        self.tracker.wait().await;
    }
}
