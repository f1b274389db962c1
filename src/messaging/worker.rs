//! # Queue Worker Pools
//!
//! One [`WorkerPool`] serves one named queue: a dispatcher task pulls
//! messages and hands each to the pool's [`TaskHandler`] on a spawned
//! task, with a semaphore bounding in-flight work and `tokio::time::timeout`
//! bounding each execution. Shutdown is cooperative: the dispatcher stops
//! pulling, in-flight handlers run to completion within the stop timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CrosspostError, Result};
use crate::messaging::errors::{QueueError, QueueResult};
use crate::messaging::message::TaskMessage;
use crate::messaging::queue::QueueReceiver;

/// Executes queue messages for one category of work.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute one message to completion. State transitions and follow-up
    /// enqueues happen inside the handler.
    async fn handle(&self, message: TaskMessage) -> Result<()>;

    /// Invoked when `handle` returns an error or exceeds its timeout.
    /// Retry scheduling happens here.
    async fn on_failure(&self, message: TaskMessage, error: CrosspostError);

    /// Execution timeout for a message.
    fn timeout(&self, message: &TaskMessage) -> Duration {
        Duration::from_millis(message.metadata.timeout_ms)
    }
}

/// Fixed-concurrency worker pool over one queue.
pub struct WorkerPool {
    queue_name: &'static str,
    concurrency: usize,
    handler: Arc<dyn TaskHandler>,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(queue_name: &'static str, concurrency: usize, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            queue_name,
            concurrency: concurrency.max(1),
            handler,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn queue_name(&self) -> &'static str {
        self.queue_name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the dispatch loop over the queue's receiver.
    pub fn start(&self, receiver: QueueReceiver) -> QueueResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(QueueError::already_running(self.queue_name));
        }

        let handle = tokio::spawn(Self::dispatch(
            self.queue_name,
            self.concurrency,
            Arc::clone(&self.handler),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.running),
            Arc::clone(&self.shutdown),
            receiver,
        ));
        *self.dispatcher.lock() = Some(handle);
        Ok(())
    }

    /// Stop pulling new messages and wait for in-flight work to finish.
    pub async fn stop(&self, timeout: Duration) -> QueueResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.notify_waiters();

        let handle = self.dispatcher.lock().take();
        let drain = async {
            if let Some(handle) = handle {
                let _ = handle.await;
            }
            // All permits back means every in-flight handler returned.
            let _ = self.semaphore.acquire_many(self.concurrency as u32).await;
        };

        tokio::time::timeout(timeout, drain)
            .await
            .map_err(|_| QueueError::shutdown_timeout(self.queue_name, timeout.as_secs()))?;

        info!(queue = self.queue_name, "🛑 Worker pool stopped");
        Ok(())
    }

    async fn dispatch(
        queue_name: &'static str,
        concurrency: usize,
        handler: Arc<dyn TaskHandler>,
        semaphore: Arc<Semaphore>,
        running: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
        mut receiver: QueueReceiver,
    ) {
        info!(queue = queue_name, concurrency, "🚀 Worker pool started");

        while running.load(Ordering::Acquire) {
            let permit = tokio::select! {
                acquired = Arc::clone(&semaphore).acquire_owned() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.notified() => break,
            };

            let message = tokio::select! {
                maybe = receiver.recv() => match maybe {
                    Some(message) => message,
                    None => break,
                },
                _ = shutdown.notified() => break,
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let _permit = permit;
                let timeout_duration = handler.timeout(&message);
                let task_id = message.task_id;

                match tokio::time::timeout(timeout_duration, handler.handle(message.clone())).await
                {
                    Ok(Ok(())) => {
                        debug!(queue = queue_name, task_id = %task_id, "✅ Message handled");
                    }
                    Ok(Err(error)) => {
                        warn!(
                            queue = queue_name,
                            task_id = %task_id,
                            error = %error,
                            "Message handling failed"
                        );
                        handler.on_failure(message, error).await;
                    }
                    Err(_) => {
                        warn!(
                            queue = queue_name,
                            task_id = %task_id,
                            timeout_seconds = timeout_duration.as_secs(),
                            "⏰ Message handling timed out"
                        );
                        let error =
                            CrosspostError::timeout(queue_name, timeout_duration.as_secs());
                        handler.on_failure(message, error).await;
                    }
                }
            });
        }

        info!(queue = queue_name, "Worker dispatch loop ended");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("queue_name", &self.queue_name)
            .field("concurrency", &self.concurrency)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::queues;
    use crate::messaging::message::{MessageMetadata, TaskCategory};
    use crate::messaging::queue::QueueClient;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingHandler {
        handled: AtomicUsize,
        failures: Mutex<Vec<CrosspostError>>,
    }

    #[async_trait]
    impl TaskHandler for CountingHandler {
        async fn handle(&self, _message: TaskMessage) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_failure(&self, _message: TaskMessage, error: CrosspostError) {
            self.failures.lock().push(error);
        }
    }

    struct SlowHandler {
        failures: Mutex<Vec<CrosspostError>>,
    }

    #[async_trait]
    impl TaskHandler for SlowHandler {
        async fn handle(&self, _message: TaskMessage) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }

        async fn on_failure(&self, _message: TaskMessage, error: CrosspostError) {
            self.failures.lock().push(error);
        }
    }

    fn adaptation_message() -> TaskMessage {
        TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TaskCategory::ImageAdaptation,
            serde_json::Value::Null,
        )
    }

    async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        tokio::time::timeout(deadline, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_pool_processes_all_messages() {
        let client = QueueClient::new(16);
        let handler = Arc::new(CountingHandler::default());
        let pool = WorkerPool::new(queues::IMAGE_ADAPTATION, 2, handler.clone());

        pool.start(client.take_receiver(queues::IMAGE_ADAPTATION).unwrap())
            .unwrap();
        for _ in 0..5 {
            client.send(adaptation_message()).await.unwrap();
        }

        assert!(
            wait_until(Duration::from_secs(2), || {
                handler.handled.load(Ordering::SeqCst) == 5
            })
            .await
        );
        assert!(handler.failures.lock().is_empty());

        pool.stop(Duration::from_secs(1)).await.unwrap();
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_timed_out_message_reaches_on_failure() {
        let client = QueueClient::new(4);
        let handler = Arc::new(SlowHandler {
            failures: Mutex::new(Vec::new()),
        });
        let pool = WorkerPool::new(queues::IMAGE_ADAPTATION, 1, handler.clone());

        pool.start(client.take_receiver(queues::IMAGE_ADAPTATION).unwrap())
            .unwrap();

        let metadata = MessageMetadata {
            timeout_ms: 20,
            ..MessageMetadata::default()
        };
        client
            .send(TaskMessage::with_metadata(
                Uuid::new_v4(),
                Uuid::new_v4(),
                TaskCategory::ImageAdaptation,
                serde_json::Value::Null,
                metadata,
            ))
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(2), || !handler.failures.lock().is_empty()).await
        );
        let failures = handler.failures.lock();
        assert!(matches!(failures[0], CrosspostError::Timeout { .. }));
        drop(failures);

        pool.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_starting_twice_is_an_error() {
        let client = QueueClient::new(4);
        let handler = Arc::new(CountingHandler::default());
        let pool = WorkerPool::new(queues::CONTENT_FORMATTING, 1, handler);

        pool.start(client.take_receiver(queues::CONTENT_FORMATTING).unwrap())
            .unwrap();
        let second = QueueClient::new(4);
        let err = pool
            .start(second.take_receiver(queues::CONTENT_FORMATTING).unwrap())
            .unwrap_err();
        assert!(matches!(err, QueueError::AlreadyRunning { .. }));

        pool.stop(Duration::from_secs(1)).await.unwrap();
    }
}
