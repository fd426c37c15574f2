use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{LogEntry, PoolStats};
use crate::storage::Storage;

/// Fixed set of workers draining one bounded queue into the storage
/// backend.
///
/// The queue is the backpressure point: a producer either gets a slot
/// within its deadline or the entry is dropped. Acceptance is a
/// durability promise — every accepted entry reaches storage exactly
/// once before [`WorkerPool::close`] returns.
pub struct WorkerPool {
    tx: mpsc::Sender<LogEntry>,
    rx: Arc<Mutex<mpsc::Receiver<LogEntry>>>,
    token: CancellationToken,
    processed: Arc<AtomicU64>,
    worker_count: usize,
    queue_capacity: usize,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers over a queue of `queue_capacity`.
    ///
    /// The pool's scope is a child of `parent`: cancelling the parent
    /// rejects further submissions immediately and closes the queue so
    /// the workers drain out and exit.
    pub fn start(
        parent: &CancellationToken,
        worker_count: usize,
        queue_capacity: usize,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let token = parent.child_token();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let processed = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            handles.push(tokio::spawn(worker_loop(
                id,
                rx.clone(),
                token.clone(),
                storage.clone(),
                processed.clone(),
            )));
        }

        debug!(workers = worker_count, capacity = queue_capacity, "worker pool started");

        Self {
            tx,
            rx,
            token,
            processed,
            worker_count,
            queue_capacity,
            handles: parking_lot::Mutex::new(handles),
        }
    }

    /// Try to enqueue an entry, waiting at most `deadline` for a slot.
    ///
    /// Returns `false` without waiting when the pool is already
    /// closing; `true` once the entry is queued; `false` if the queue
    /// stayed full past the deadline.
    pub async fn submit_with_timeout(&self, entry: LogEntry, deadline: Duration) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx.send_timeout(entry, deadline).await.is_ok()
    }

    /// Stop accepting work, drain everything already accepted, and
    /// wait for every worker to exit.
    pub async fn close(&self) {
        // Cancelling wakes any worker parked on an empty queue; the
        // workers close the queue themselves and drain what is left.
        self.token.cancel();
        self.rx.lock().await.close();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("worker task failed to join: {}", e);
            }
        }
        debug!("worker pool closed");
    }

    /// Non-blocking stats snapshot. Fields are read independently; the
    /// triple is eventually-consistent, not atomic.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            processed: self.processed.load(Ordering::Relaxed),
            queue_length: self.queue_capacity - self.tx.capacity(),
            worker_count: self.worker_count,
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<LogEntry>>>,
    token: CancellationToken,
    storage: Arc<dyn Storage>,
    processed: Arc<AtomicU64>,
) {
    loop {
        // The queue lock is held for the dequeue only, never across
        // the storage call. The dequeue races cancellation so a worker
        // parked on an empty queue still wakes up; on cancellation it
        // closes the queue and keeps draining until it is empty, which
        // is what keeps accepted entries from being lost.
        let entry = {
            let mut queue = rx.lock().await;
            tokio::select! {
                entry = queue.recv() => entry,
                _ = token.cancelled() => {
                    queue.close();
                    queue.recv().await
                }
            }
        };
        let Some(entry) = entry else {
            debug!(worker = id, "queue closed and drained, exiting");
            return;
        };

        // A storage fault loses this one increment, never the worker.
        if let Err(e) = storage.increment_level_count(&entry.service, &entry.level) {
            warn!(worker = id, service = %entry.service, "storage increment failed: {}", e);
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
}
