//! Persistent job queue for batch processing
//!
//! JetStream-backed work queue with at-least-once delivery, bounded
//! retries and exponential backoff. When NATS is not configured (or an
//! enqueue fails) the in-process implementation runs the handler on a
//! spawned task instead, so a batch still completes, just without retry
//! protection. Call sites talk to the `JobQueue` trait and never branch
//! on which implementation is live.

pub mod error;
pub mod inprocess;
pub mod jetstream;
pub mod retry;

pub use error::{Error, Result};
pub use inprocess::InProcessQueue;
pub use jetstream::{JetStreamQueue, QueueConfig};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job name for batch reconciliation work.
pub const BATCH_JOB_NAME: &str = "reconciliation-batch-processing";

/// Payload persisted in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub batch_id: Uuid,
    pub file_path: String,
}

/// Consumer side: the batch worker implements this. Must be idempotent
/// for the same batch id, since delivery is at-least-once.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: BatchJob) -> anyhow::Result<()>;
}

/// Producer side: the upload path enqueues through this.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &BatchJob) -> Result<()>;
}
