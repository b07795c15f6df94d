// Batch lifecycle: creation, reset for (re)processing, counters, terminal states

use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{BatchStatus, CounterDelta, ReconciliationBatch};
use crate::ReconStore;

/// Parameters for the batch listing endpoint.
#[derive(Debug, Clone)]
pub struct BatchListQuery {
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub sort_by_updated: bool,
    pub ascending: bool,
}

impl ReconStore {
    /// Create a batch in `uploading` with zeroed counters.
    pub async fn create_batch(&self, filename: &str) -> Result<ReconciliationBatch> {
        let batch = sqlx::query_as::<_, ReconciliationBatch>(
            r#"
            INSERT INTO reconciliation_batches (filename, status, started_at)
            VALUES ($1, 'uploading', now())
            RETURNING *
            "#,
        )
        .bind(filename)
        .fetch_one(&self.pool)
        .await?;

        info!("Created reconciliation batch {} for {}", batch.id, filename);
        Ok(batch)
    }

    pub async fn get_batch(&self, id: Uuid) -> Result<Option<ReconciliationBatch>> {
        Ok(sqlx::query_as::<_, ReconciliationBatch>(
            "SELECT * FROM reconciliation_batches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_batches(
        &self,
        query: &BatchListQuery,
    ) -> Result<(Vec<ReconciliationBatch>, i64)> {
        // Sort keys are fixed strings selected here, never caller input
        let sort_expr = if query.sort_by_updated {
            "COALESCE(completed_at, started_at)"
        } else {
            "created_at"
        };
        let direction = if query.ascending { "ASC" } else { "DESC" };

        let sql = format!(
            r#"
            SELECT * FROM reconciliation_batches
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY {sort_expr} {direction}, id {direction}
            LIMIT $2 OFFSET $3
            "#,
        );

        let batches = sqlx::query_as::<_, ReconciliationBatch>(&sql)
            .bind(&query.status)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reconciliation_batches WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(&query.status)
        .fetch_one(&self.pool)
        .await?;

        Ok((batches, total))
    }

    /// Discard any prior transactions for this batch and reopen it for
    /// processing. Re-delivered jobs call this first, which is what makes
    /// the worker idempotent under at-least-once delivery.
    pub async fn reset_batch_for_processing(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM bank_transactions WHERE upload_batch_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            r#"
            UPDATE reconciliation_batches
            SET status = 'processing',
                started_at = now(),
                completed_at = NULL,
                total_transactions = 0,
                processed_count = 0,
                auto_matched_count = 0,
                needs_review_count = 0,
                unmatched_count = 0
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("batch", id.to_string()));
        }

        tx.commit().await?;
        info!("Reset batch {} for processing", id);
        Ok(())
    }

    pub async fn set_batch_total(&self, id: Uuid, total: i32) -> Result<()> {
        sqlx::query("UPDATE reconciliation_batches SET total_transactions = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomic additive counter update.
    pub async fn increment_batch_counters(&self, id: Uuid, delta: &CounterDelta) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_batches
            SET processed_count = processed_count + $2,
                auto_matched_count = auto_matched_count + $3,
                needs_review_count = needs_review_count + $4,
                unmatched_count = unmatched_count + $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta.processed)
        .bind(delta.auto_matched)
        .bind(delta.needs_review)
        .bind(delta.unmatched)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Single authoritative counter write once the stream is exhausted:
    /// processed equals total and the classification counters are final.
    pub async fn finalize_batch_counters(
        &self,
        id: Uuid,
        total: i32,
        auto_matched: i32,
        needs_review: i32,
        unmatched: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_batches
            SET total_transactions = $2,
                processed_count = $2,
                auto_matched_count = $3,
                needs_review_count = $4,
                unmatched_count = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(auto_matched)
        .bind(needs_review)
        .bind(unmatched)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_batch_completed(&self, id: Uuid) -> Result<()> {
        self.mark_batch_terminal(id, BatchStatus::Completed).await
    }

    pub async fn mark_batch_failed(&self, id: Uuid) -> Result<()> {
        self.mark_batch_terminal(id, BatchStatus::Failed).await
    }

    async fn mark_batch_terminal(&self, id: Uuid, status: BatchStatus) -> Result<()> {
        sqlx::query(
            "UPDATE reconciliation_batches SET status = $2, completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        info!("Batch {} marked {}", id, status.as_str());
        Ok(())
    }
}
