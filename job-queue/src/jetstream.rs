// JetStream work queue: persistent, retrying delivery of batch jobs

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{self, PullConsumer},
    stream::{Config as StreamConfig, RetentionPolicy, StorageType},
    Context as JetStreamContext,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::retry::RetryPolicy;
use crate::{BatchJob, Error, JobHandler, JobQueue, Result};

/// Queue tuning. `ack_wait` is the lock duration: a worker holding a job
/// longer than this allows redelivery to another worker.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub stream_name: String,
    pub subject: String,
    pub durable_name: String,
    pub ack_wait: Duration,
    pub max_deliver: i64,
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stream_name: "RECON_JOBS".to_string(),
            subject: "recon.jobs.batch".to_string(),
            durable_name: "recon-batch-workers".to_string(),
            ack_wait: Duration::from_secs(60),
            max_deliver: 3,
            concurrency: 2,
        }
    }
}

pub struct JetStreamQueue {
    context: JetStreamContext,
    config: QueueConfig,
    retry: RetryPolicy,
    fallback: Option<Arc<dyn JobQueue>>,
}

impl JetStreamQueue {
    /// Connect and ensure the work-queue stream exists.
    pub async fn connect(nats_url: &str, config: QueueConfig) -> Result<Self> {
        info!("Connecting job queue to NATS at {}", nats_url);

        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let context = jetstream::new(client);

        let stream_config = StreamConfig {
            name: config.stream_name.clone(),
            description: Some("Reconciliation batch jobs".to_string()),
            subjects: vec![format!("{}.>", stream_subject_root(&config.subject))],
            retention: RetentionPolicy::WorkQueue,
            storage: StorageType::File,
            max_age: Duration::from_secs(7 * 24 * 3600),
            duplicate_window: Duration::from_secs(300),
            ..Default::default()
        };

        context
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| Error::StreamCreation(e.to_string()))?;

        info!("Stream {} ready", config.stream_name);

        Ok(Self {
            context,
            config,
            retry: RetryPolicy::default(),
            fallback: None,
        })
    }

    /// Attach the queue used when a publish fails. The upload path keeps
    /// calling `enqueue`; degradation happens inside this implementation.
    pub fn with_fallback(mut self, fallback: Arc<dyn JobQueue>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Spawn the consumer loops. Each loop pulls from the same durable
    /// consumer, so a job is delivered to exactly one of them at a time.
    pub async fn start_consumers(&self, handler: Arc<dyn JobHandler>) -> Result<()> {
        let consumer_config = consumer::pull::Config {
            durable_name: Some(self.config.durable_name.clone()),
            description: Some("Batch reconciliation worker".to_string()),
            filter_subject: self.config.subject.clone(),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.config.ack_wait,
            max_deliver: self.config.max_deliver,
            ..Default::default()
        };

        let stream = self
            .context
            .get_stream(self.config.stream_name.clone())
            .await
            .map_err(|e| Error::StreamCreation(e.to_string()))?;

        let consumer: PullConsumer = stream
            .create_consumer(consumer_config)
            .await
            .map_err(|e| Error::ConsumerCreation(e.to_string()))?;

        for worker_id in 0..self.config.concurrency.max(1) {
            let consumer = consumer.clone();
            let handler = handler.clone();
            let retry = self.retry.clone();

            tokio::spawn(async move {
                if let Err(e) = consume_loop(worker_id, consumer, handler, retry).await {
                    error!("Queue consumer {} stopped: {}", worker_id, e);
                }
            });
        }

        info!(
            "Started {} queue consumer(s) on {}",
            self.config.concurrency.max(1),
            self.config.subject
        );
        Ok(())
    }
}

fn stream_subject_root(subject: &str) -> &str {
    subject.rsplit_once('.').map(|(root, _)| root).unwrap_or(subject)
}

async fn consume_loop(
    worker_id: usize,
    consumer: PullConsumer,
    handler: Arc<dyn JobHandler>,
    retry: RetryPolicy,
) -> Result<()> {
    let mut messages = consumer
        .messages()
        .await
        .map_err(|e| Error::Subscribe(e.to_string()))?;

    info!("Queue consumer {} listening", worker_id);

    while let Some(message) = messages.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("Consumer {} stream error: {}", worker_id, e);
                continue;
            }
        };

        let job: BatchJob = match serde_json::from_slice(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                error!("Consumer {} received unparseable job: {}", worker_id, e);
                // Terminate bad message (won't be redelivered)
                if let Err(term_err) = message.ack_with(jetstream::AckKind::Term).await {
                    error!("Failed to terminate bad message: {}", term_err);
                }
                continue;
            }
        };

        let attempt = message.info().map(|info| info.delivered).unwrap_or(1);
        info!(
            "Consumer {} picked up batch {} (attempt {})",
            worker_id, job.batch_id, attempt
        );

        match handler.handle(job.clone()).await {
            Ok(()) => {
                if let Err(e) = message.ack().await {
                    error!("Failed to ack job for batch {}: {}", job.batch_id, e);
                }
            }
            Err(e) => {
                error!(
                    "Batch {} failed on attempt {}: {}",
                    job.batch_id, attempt, e
                );

                // Negative acknowledgment with backoff; JetStream stops
                // redelivering once max_deliver is reached
                let delay = retry.delay_for_attempt(attempt);
                if let Err(nak_err) = message
                    .ack_with(jetstream::AckKind::Nak(Some(delay)))
                    .await
                {
                    error!("Failed to nak job for batch {}: {}", job.batch_id, nak_err);
                }
            }
        }
    }

    warn!("Consumer {} subscription ended", worker_id);
    Ok(())
}

#[async_trait]
impl JobQueue for JetStreamQueue {
    async fn enqueue(&self, job: &BatchJob) -> Result<()> {
        let payload = serde_json::to_vec(job)?;

        let mut headers = async_nats::HeaderMap::new();
        // Message id gives JetStream-side deduplication within the window
        headers.insert("Nats-Msg-Id", job.batch_id.to_string().as_str());

        let publish = async {
            self.context
                .publish_with_headers(self.config.subject.clone(), headers, payload.into())
                .await
                .map_err(|e| Error::Publish(e.to_string()))?
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;
            Ok::<(), Error>(())
        };

        match publish.await {
            Ok(()) => {
                info!("Enqueued batch job {}", job.batch_id);
                Ok(())
            }
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        "Enqueue failed for batch {} ({}); running in-process",
                        job.batch_id, e
                    );
                    fallback.enqueue(job).await
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "RECON_JOBS");
        assert_eq!(config.max_deliver, 3);
        assert_eq!(config.ack_wait, Duration::from_secs(60));
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_stream_subject_root() {
        assert_eq!(stream_subject_root("recon.jobs.batch"), "recon.jobs");
        assert_eq!(stream_subject_root("flat"), "flat");
    }
}
