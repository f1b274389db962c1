//! # In-Process Task Queues
//!
//! Fixed set of named, bounded queues backed by tokio mpsc channels. The
//! queue set is created once at startup from [`queues::ALL_QUEUES`]; each
//! queue hands its receiving end to exactly one worker pool. Senders get
//! backpressure (an await) instead of an error when a queue is full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::constants::{defaults, queues};
use crate::messaging::errors::{QueueError, QueueResult};
use crate::messaging::message::TaskMessage;

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_name: String,
    /// Messages currently waiting for a worker.
    pub depth: usize,
    /// Messages accepted since startup, including retries.
    pub enqueued_total: u64,
}

struct NamedQueue {
    sender: mpsc::Sender<TaskMessage>,
    receiver: Mutex<Option<mpsc::Receiver<TaskMessage>>>,
    depth: Arc<AtomicUsize>,
    enqueued_total: AtomicU64,
}

impl NamedQueue {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            depth: Arc::new(AtomicUsize::new(0)),
            enqueued_total: AtomicU64::new(0),
        }
    }
}

/// Receiving end of one named queue, owned by its worker pool.
#[derive(Debug)]
pub struct QueueReceiver {
    queue_name: &'static str,
    receiver: mpsc::Receiver<TaskMessage>,
    depth: Arc<AtomicUsize>,
}

impl QueueReceiver {
    pub fn queue_name(&self) -> &'static str {
        self.queue_name
    }

    /// Next message, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<TaskMessage> {
        let message = self.receiver.recv().await;
        if message.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        message
    }
}

/// Handle to the full queue set; clone-cheap via `Arc` at call sites.
pub struct QueueClient {
    queues: HashMap<&'static str, NamedQueue>,
}

impl QueueClient {
    /// Create every named queue with the given per-queue capacity.
    pub fn new(capacity: usize) -> Self {
        let queues = queues::ALL_QUEUES
            .iter()
            .map(|&name| (name, NamedQueue::new(capacity)))
            .collect();
        Self { queues }
    }

    fn queue(&self, queue_name: &str) -> QueueResult<&NamedQueue> {
        self.queues
            .get(queue_name)
            .ok_or_else(|| QueueError::queue_not_found(queue_name))
    }

    /// Enqueue a message on the queue its category selects. Awaits when
    /// the queue is at capacity.
    pub async fn send(&self, message: TaskMessage) -> QueueResult<()> {
        let queue_name = message.queue_name();
        let queue = self.queue(queue_name)?;
        let task_id = message.task_id;

        // Depth goes up before the send so the worker-side decrement can
        // never observe the message first.
        queue.depth.fetch_add(1, Ordering::AcqRel);
        if let Err(err) = queue.sender.send(message).await {
            queue.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::send_failed(queue_name, err.to_string()));
        }
        queue.enqueued_total.fetch_add(1, Ordering::Relaxed);

        debug!(queue = queue_name, task_id = %task_id, "📤 Message enqueued");
        Ok(())
    }

    /// Take the receiving end of a queue. Succeeds exactly once per queue.
    pub fn take_receiver(&self, queue_name: &'static str) -> QueueResult<QueueReceiver> {
        let queue = self.queue(queue_name)?;
        let receiver = queue
            .receiver
            .lock()
            .take()
            .ok_or_else(|| QueueError::receiver_taken(queue_name))?;

        Ok(QueueReceiver {
            queue_name,
            receiver,
            depth: Arc::clone(&queue.depth),
        })
    }

    /// Messages currently waiting on one queue.
    pub fn depth(&self, queue_name: &str) -> QueueResult<usize> {
        Ok(self.queue(queue_name)?.depth.load(Ordering::Acquire))
    }

    /// Counters for every queue, in the fixed queue order.
    pub fn stats(&self) -> Vec<QueueStats> {
        queues::ALL_QUEUES
            .iter()
            .filter_map(|&name| self.queues.get(name).map(|q| (name, q)))
            .map(|(name, queue)| QueueStats {
                queue_name: name.to_string(),
                depth: queue.depth.load(Ordering::Acquire),
                enqueued_total: queue.enqueued_total.load(Ordering::Relaxed),
            })
            .collect()
    }
}

impl Default for QueueClient {
    fn default() -> Self {
        Self::new(defaults::QUEUE_CAPACITY)
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("queues", &self.stats())
            .finish()
    }
}
