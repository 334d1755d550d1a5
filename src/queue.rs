use crate::error::{BridgeError, Result};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One unit of device work
///
/// The operation performs exactly one device call. When its future
/// resolves the call is finished and the queue advances; the optional
/// `on_finished` hook runs after that.
pub struct QueueItem {
    id: String,
    operation: BoxFuture<'static, ()>,
    on_finished: Option<Box<dyn FnOnce() + Send>>,
}

impl QueueItem {
    /// Create an item; `id` is a diagnostic tag and need not be unique
    pub fn new(id: impl Into<String>, operation: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            id: id.into(),
            operation: Box::pin(operation),
            on_finished: None,
        }
    }

    /// Run `hook` once the operation has finished
    pub fn on_finished(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_finished = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Single-flight FIFO of device operations
///
/// A worker task awaits one item at a time in the order items were added,
/// so at most one device call is ever in flight. The queue knows nothing
/// about success or failure. An operation that never resolves, or panics,
/// stalls the queue for good.
pub struct CommandQueue {
    name: String,
    tx: mpsc::UnboundedSender<QueueItem>,
    pending: Arc<AtomicUsize>,
}

impl CommandQueue {
    /// Create the queue and spawn its worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel::<QueueItem>();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_worker(name.clone(), rx, pending.clone()));

        Self { name, tx, pending }
    }

    /// Append an item; it starts right away if nothing is running
    pub fn add(&self, item: QueueItem) -> Result<()> {
        tracing::trace!(queue = self.name(), item = item.id(), "queued");
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(item).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            BridgeError::QueueClosed
        })
    }

    /// Items queued or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

async fn run_worker(name: String, mut rx: mpsc::UnboundedReceiver<QueueItem>, pending: Arc<AtomicUsize>) {
    while let Some(item) = rx.recv().await {
        let QueueItem {
            id,
            operation,
            on_finished,
        } = item;

        tracing::trace!(queue = %name, item = %id, "running");
        operation.await;

        // finished: the next item may start
        pending.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(queue = %name, item = %id, "finished");

        if let Some(hook) = on_finished {
            hook();
        }
    }

    tracing::debug!(queue = %name, "Command queue worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_items_run_in_fifo_order_without_overlap() {
        let queue = CommandQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();
        let mut done_tx = Some(done_tx);

        for i in 0..5u64 {
            let log = log.clone();
            let mut item = QueueItem::new(format!("op-{}", i), async move {
                log.lock().unwrap().push(format!("start {}", i));
                // later items sleep less, so any overlap would reorder the log
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                log.lock().unwrap().push(format!("end {}", i));
            });
            if i == 4 {
                let tx = done_tx.take().unwrap();
                item = item.on_finished(move || {
                    let _ = tx.send(());
                });
            }
            queue.add(item).unwrap();
        }

        done_rx.await.unwrap();
        let log = log.lock().unwrap().clone();
        let expected: Vec<String> = (0..5)
            .flat_map(|i| [format!("start {}", i), format!("end {}", i)])
            .collect();
        assert_eq!(log, expected);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_on_finished_runs_after_operation() {
        let queue = CommandQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();

        let op_log = log.clone();
        let hook_log = log.clone();
        let item = QueueItem::new("only", async move {
            tokio::task::yield_now().await;
            op_log.lock().unwrap().push("operation");
        })
        .on_finished(move || {
            hook_log.lock().unwrap().push("hook");
            let _ = tx.send(());
        });
        queue.add(item).unwrap();

        rx.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["operation", "hook"]);
    }

    #[tokio::test]
    async fn test_item_and_queue_identity() {
        let queue = CommandQueue::new("RINCON_1");
        let item = QueueItem::new("pull:getVolume", async {});

        assert_eq!(queue.name(), "RINCON_1");
        assert_eq!(item.id(), "pull:getVolume");
        queue.add(item).unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_not_deduplicated() {
        let queue = CommandQueue::new("test");
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        for _ in 0..2 {
            let count = count.clone();
            queue
                .add(QueueItem::new("same", async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        queue
            .add(QueueItem::new("marker", async {}).on_finished(move || {
                let _ = tx.send(());
            }))
            .unwrap();

        rx.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pending_counts_queued_and_running_items() {
        let queue = CommandQueue::new("test");
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();

        queue
            .add(QueueItem::new("blocker", async move {
                let _ = release_rx.await;
            }))
            .unwrap();
        queue
            .add(QueueItem::new("after", async {}).on_finished(move || {
                let _ = done_tx.send(());
            }))
            .unwrap();

        assert_eq!(queue.pending(), 2);
        release_tx.send(()).unwrap();
        done_rx.await.unwrap();
        assert_eq!(queue.pending(), 0);
    }
}
