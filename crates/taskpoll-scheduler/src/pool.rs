use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::PoolError;
use crate::runner::TaskExecutor;
use crate::types::Dispatch;

/// Bounded-concurrency dispatcher.
///
/// `size` worker tasks pull from one unbounded FIFO queue, so at most `size`
/// dispatches execute at once and submission never waits for a free slot.
/// Each slot runs one dispatch to completion before taking the next.
pub struct ExecutionPool {
    tx: mpsc::UnboundedSender<Dispatch>,
    workers: Vec<JoinHandle<()>>,
}

impl ExecutionPool {
    /// Start `size` workers (at least one). Must be called inside a Tokio runtime.
    pub fn new(size: usize, executor: Arc<dyn TaskExecutor>) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Dispatch>();
        let queue = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|slot| {
                let queue = Arc::clone(&queue);
                let executor = Arc::clone(&executor);
                tokio::spawn(worker_loop(slot, queue, executor))
            })
            .collect();

        debug!(size, "execution pool started");
        Self { tx, workers }
    }

    /// Enqueue a dispatch. Returns immediately regardless of pool saturation.
    pub fn submit(&self, dispatch: Dispatch) -> Result<(), PoolError> {
        self.tx.send(dispatch).map_err(|_| PoolError::Closed)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue and wait until every queued and running dispatch is done.
    pub async fn shutdown(self) {
        let Self { tx, workers } = self;
        drop(tx);
        for handle in workers {
            if let Err(e) = handle.await {
                error!("pool worker ended abnormally: {e}");
            }
        }
        info!("execution pool drained");
    }
}

async fn worker_loop(
    slot: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Dispatch>>>,
    executor: Arc<dyn TaskExecutor>,
) {
    loop {
        // Hold the lock only while waiting for the next item so FIFO order
        // across slots follows submission order.
        let next = { queue.lock().await.recv().await };
        let Some(dispatch) = next else {
            break;
        };

        let name = dispatch.record.name.clone();
        let executor = Arc::clone(&executor);
        // A panicking executor must not take the slot down with it.
        match tokio::spawn(async move { executor.execute(dispatch).await }).await {
            Ok(ok) => debug!(slot, task = %name, ok, "pool slot finished task"),
            Err(e) => error!(slot, task = %name, "task execution panicked: {e}"),
        }
    }
    debug!(slot, "pool slot stopped");
}
