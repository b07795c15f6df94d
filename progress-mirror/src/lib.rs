//! Progress mirror - fast-path counters for in-flight batches
//!
//! Advisory only: the mirror may be stale, missing or down, and every
//! reader falls back to the authoritative store. Writes are best-effort;
//! failures are logged and swallowed, never propagated. A no-op
//! implementation is selected at startup when Redis is not configured,
//! so call sites never branch on availability.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};
use uuid::Uuid;

/// Key TTL constants (in seconds)
pub mod ttl {
    /// Abandoned in-flight batches age out after a day.
    pub const BATCH_PROGRESS: i64 = 86_400;
}

/// Key prefixes
pub mod keys {
    pub const BATCH_PROGRESS: &str = "recon:batch";
}

/// Counter snapshot mirrored per batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub total: i64,
    pub processed: i64,
    pub auto_matched: i64,
    pub needs_review: i64,
    pub unmatched: i64,
    pub status: String,
}

/// Per-field additive update applied after each worker chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressDelta {
    pub processed: i64,
    pub auto_matched: i64,
    pub needs_review: i64,
    pub unmatched: i64,
}

#[async_trait]
pub trait ProgressMirror: Send + Sync {
    async fn init(&self, batch_id: Uuid);
    async fn set_total(&self, batch_id: Uuid, total: i64);
    async fn increment(&self, batch_id: Uuid, delta: &ProgressDelta);
    async fn set_status(&self, batch_id: Uuid, status: &str);
    async fn get(&self, batch_id: Uuid) -> Option<BatchProgress>;
    async fn clear(&self, batch_id: Uuid);
}

// ===== REDIS IMPLEMENTATION =====

#[derive(Clone)]
pub struct RedisMirror {
    redis: ConnectionManager,
}

impl RedisMirror {
    pub fn new(redis: ConnectionManager) -> Self {
        RedisMirror { redis }
    }

    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected progress mirror to Redis");
        Ok(RedisMirror::new(manager))
    }

    fn key(batch_id: Uuid) -> String {
        format!("{}:{}", keys::BATCH_PROGRESS, batch_id)
    }
}

#[async_trait]
impl ProgressMirror for RedisMirror {
    async fn init(&self, batch_id: Uuid) {
        let key = Self::key(batch_id);
        let fields: [(&str, i64); 5] = [
            ("total", 0),
            ("processed", 0),
            ("auto_matched", 0),
            ("needs_review", 0),
            ("unmatched", 0),
        ];

        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(&key).await {
            warn!("Mirror init (del) failed for batch {}: {}", batch_id, e);
            return;
        }
        if let Err(e) = conn.hset_multiple::<_, _, _, ()>(&key, &fields).await {
            warn!("Mirror init failed for batch {}: {}", batch_id, e);
            return;
        }
        if let Err(e) = conn
            .hset::<_, _, _, ()>(&key, "status", "processing")
            .await
        {
            warn!("Mirror init (status) failed for batch {}: {}", batch_id, e);
            return;
        }
        if let Err(e) = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(ttl::BATCH_PROGRESS)
            .query_async::<_, ()>(&mut conn)
            .await
        {
            warn!("Mirror init (expire) failed for batch {}: {}", batch_id, e);
        }
    }

    async fn set_total(&self, batch_id: Uuid, total: i64) {
        let key = Self::key(batch_id);
        if let Err(e) = self
            .redis
            .clone()
            .hset::<_, _, _, ()>(&key, "total", total)
            .await
        {
            warn!("Mirror set_total failed for batch {}: {}", batch_id, e);
        }
    }

    async fn increment(&self, batch_id: Uuid, delta: &ProgressDelta) {
        let key = Self::key(batch_id);
        let mut conn = self.redis.clone();

        let fields: [(&str, i64); 4] = [
            ("processed", delta.processed),
            ("auto_matched", delta.auto_matched),
            ("needs_review", delta.needs_review),
            ("unmatched", delta.unmatched),
        ];

        for (field, value) in fields {
            if value == 0 {
                continue;
            }
            if let Err(e) = conn.hincr::<_, _, _, i64>(&key, field, value).await {
                warn!(
                    "Mirror increment {} failed for batch {}: {}",
                    field, batch_id, e
                );
                return;
            }
        }
    }

    async fn set_status(&self, batch_id: Uuid, status: &str) {
        let key = Self::key(batch_id);
        if let Err(e) = self
            .redis
            .clone()
            .hset::<_, _, _, ()>(&key, "status", status)
            .await
        {
            warn!("Mirror set_status failed for batch {}: {}", batch_id, e);
        }
    }

    async fn get(&self, batch_id: Uuid) -> Option<BatchProgress> {
        let key = Self::key(batch_id);

        let fields: std::collections::HashMap<String, String> =
            match self.redis.clone().hgetall(&key).await {
                Ok(fields) => fields,
                Err(e) => {
                    warn!("Mirror read failed for batch {}: {}", batch_id, e);
                    return None;
                }
            };

        if fields.is_empty() {
            return None;
        }

        let int = |name: &str| -> i64 {
            fields
                .get(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or_default()
        };

        Some(BatchProgress {
            total: int("total"),
            processed: int("processed"),
            auto_matched: int("auto_matched"),
            needs_review: int("needs_review"),
            unmatched: int("unmatched"),
            status: fields.get("status").cloned().unwrap_or_default(),
        })
    }

    async fn clear(&self, batch_id: Uuid) {
        let key = Self::key(batch_id);
        if let Err(e) = self.redis.clone().del::<_, ()>(&key).await {
            warn!("Mirror clear failed for batch {}: {}", batch_id, e);
        }
    }
}

// ===== NO-OP IMPLEMENTATION =====

/// Selected at startup when Redis is not configured. Readers always fall
/// back to the authoritative store.
pub struct NoopMirror;

#[async_trait]
impl ProgressMirror for NoopMirror {
    async fn init(&self, _batch_id: Uuid) {}
    async fn set_total(&self, _batch_id: Uuid, _total: i64) {}
    async fn increment(&self, _batch_id: Uuid, _delta: &ProgressDelta) {}
    async fn set_status(&self, _batch_id: Uuid, _status: &str) {}
    async fn get(&self, _batch_id: Uuid) -> Option<BatchProgress> {
        None
    }
    async fn clear(&self, _batch_id: Uuid) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_mirror_reads_nothing() {
        let mirror = NoopMirror;
        let batch_id = Uuid::new_v4();

        mirror.init(batch_id).await;
        mirror.set_total(batch_id, 100).await;
        mirror
            .increment(
                batch_id,
                &ProgressDelta {
                    processed: 10,
                    auto_matched: 5,
                    needs_review: 3,
                    unmatched: 2,
                },
            )
            .await;

        assert_eq!(mirror.get(batch_id).await, None);
    }

    #[test]
    fn test_key_shape() {
        let id = Uuid::from_u128(7);
        assert_eq!(
            RedisMirror::key(id),
            format!("recon:batch:{}", id)
        );
    }
}
