// In-process execution: graceful fallback when the queue is unavailable

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::{BatchJob, JobHandler, JobQueue, Result};

/// Runs jobs on a spawned task in this process. No persistence and no
/// retries; the batch still completes, and worker failures are surfaced
/// through the batch's `failed` status rather than redelivery.
pub struct InProcessQueue {
    handler: Arc<dyn JobHandler>,
}

impl InProcessQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        InProcessQueue { handler }
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: &BatchJob) -> Result<()> {
        let handler = self.handler.clone();
        let job = job.clone();

        info!("Running batch {} in-process", job.batch_id);
        tokio::spawn(async move {
            let batch_id = job.batch_id;
            if let Err(e) = handler.handle(job).await {
                // The worker has already marked the batch failed; nothing
                // left to retry without a persistent queue
                error!("In-process batch {} failed: {}", batch_id, e);
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: BatchJob) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enqueue_runs_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = InProcessQueue::new(Arc::new(CountingHandler {
            calls: calls.clone(),
        }));

        let job = BatchJob {
            batch_id: Uuid::new_v4(),
            file_path: "/tmp/upload.csv".to_string(),
        };

        queue.enqueue(&job).await.unwrap();

        // The handler runs on a spawned task; yield until it has
        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_poison_queue() {
        struct FailingHandler;

        #[async_trait]
        impl JobHandler for FailingHandler {
            async fn handle(&self, _job: BatchJob) -> anyhow::Result<()> {
                anyhow::bail!("worker exploded")
            }
        }

        let queue = InProcessQueue::new(Arc::new(FailingHandler));
        let job = BatchJob {
            batch_id: Uuid::new_v4(),
            file_path: "/tmp/upload.csv".to_string(),
        };

        // Both enqueues succeed even though the handler fails
        queue.enqueue(&job).await.unwrap();
        queue.enqueue(&job).await.unwrap();
    }
}
