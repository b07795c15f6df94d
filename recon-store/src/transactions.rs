// Bank transaction persistence: bulk inserts, cursor scans, guarded transitions

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::cursor::PageCursor;
use crate::error::Result;
use crate::models::{AutoMatchedRow, BankTransaction, NewBankTransaction};
use crate::ReconStore;

/// What a transition does to `matched_invoice_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceEffect {
    /// Leave the current link untouched (confirm).
    Keep,
    /// Clear the link (reject, mark external).
    Clear,
    /// Point at a different invoice (manual match).
    Set(Uuid),
}

impl InvoiceEffect {
    fn binds(&self) -> (bool, Option<Uuid>) {
        match self {
            InvoiceEffect::Keep => (true, None),
            InvoiceEffect::Clear => (false, None),
            InvoiceEffect::Set(id) => (false, Some(*id)),
        }
    }
}

impl ReconStore {
    /// Insert a worker chunk in one round trip.
    pub async fn bulk_insert_transactions(&self, rows: &[NewBankTransaction]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut batch_ids: Vec<Uuid> = Vec::with_capacity(rows.len());
        let mut dates: Vec<NaiveDate> = Vec::with_capacity(rows.len());
        let mut descriptions: Vec<String> = Vec::with_capacity(rows.len());
        let mut amounts: Vec<Decimal> = Vec::with_capacity(rows.len());
        let mut references: Vec<Option<String>> = Vec::with_capacity(rows.len());
        let mut statuses: Vec<String> = Vec::with_capacity(rows.len());
        let mut matched: Vec<Option<Uuid>> = Vec::with_capacity(rows.len());
        let mut scores: Vec<Option<Decimal>> = Vec::with_capacity(rows.len());
        let mut details: Vec<serde_json::Value> = Vec::with_capacity(rows.len());

        for row in rows {
            batch_ids.push(row.upload_batch_id);
            dates.push(row.transaction_date);
            descriptions.push(row.description.clone());
            amounts.push(row.amount);
            references.push(row.reference_number.clone());
            statuses.push(row.status.clone());
            matched.push(row.matched_invoice_id);
            scores.push(row.confidence_score);
            details.push(row.match_details.clone());
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO bank_transactions (
                upload_batch_id, transaction_date, description, amount,
                reference_number, status, matched_invoice_id,
                confidence_score, match_details
            )
            SELECT * FROM UNNEST(
                $1::uuid[], $2::date[], $3::text[], $4::numeric[],
                $5::text[], $6::text[], $7::uuid[],
                $8::numeric[], $9::jsonb[]
            )
            "#,
        )
        .bind(&batch_ids)
        .bind(&dates)
        .bind(&descriptions)
        .bind(&amounts)
        .bind(&references)
        .bind(&statuses)
        .bind(&matched)
        .bind(&scores)
        .bind(&details)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected())
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<BankTransaction>> {
        Ok(
            sqlx::query_as::<_, BankTransaction>("SELECT * FROM bank_transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Keyset-paginated page over one batch, ordered `(created_at DESC,
    /// id DESC)`. Fetches `limit + 1` rows; the second element of the
    /// return is `has_more`.
    pub async fn list_batch_transactions(
        &self,
        batch_id: Uuid,
        status: Option<&str>,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<(Vec<BankTransaction>, bool)> {
        let cursor_created = cursor.map(|c| c.created_at);
        let cursor_id = cursor.map(|c| c.id);

        let mut rows = sqlx::query_as::<_, BankTransaction>(
            r#"
            SELECT * FROM bank_transactions
            WHERE upload_batch_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::timestamptz IS NULL
                   OR created_at < $3
                   OR (created_at = $3 AND id < $4))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(batch_id)
        .bind(status)
        .bind(cursor_created)
        .bind(cursor_id)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        Ok((rows, has_more))
    }

    /// Recover the ids of this batch's auto-matched inserts for the
    /// worker's audit pass. Bounded by the batch size.
    pub async fn find_auto_matched_for_audit(&self, batch_id: Uuid) -> Result<Vec<AutoMatchedRow>> {
        Ok(sqlx::query_as::<_, AutoMatchedRow>(
            r#"
            SELECT id, matched_invoice_id, confidence_score
            FROM bank_transactions
            WHERE upload_batch_id = $1
              AND status = 'auto_matched'
              AND matched_invoice_id IS NOT NULL
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ===== TRANSACTIONAL HELPERS (admin state machine) =====

    pub async fn tx_get_transaction(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Option<BankTransaction>> {
        Ok(
            sqlx::query_as::<_, BankTransaction>("SELECT * FROM bank_transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?,
        )
    }

    /// Status-guarded UPDATE. Returns the updated row, or None when the
    /// row was not in an allowed status anymore: the guard in the WHERE
    /// clause is what closes the check-then-act race with concurrent
    /// admin actions.
    pub async fn tx_apply_transition(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        allowed_from: &[&str],
        new_status: &str,
        effect: InvoiceEffect,
    ) -> Result<Option<BankTransaction>> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.to_string()).collect();
        let (keep, new_invoice) = effect.binds();

        Ok(sqlx::query_as::<_, BankTransaction>(
            r#"
            UPDATE bank_transactions
            SET status = $2,
                matched_invoice_id = CASE WHEN $3 THEN matched_invoice_id ELSE $4 END
            WHERE id = $1 AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_status)
        .bind(keep)
        .bind(new_invoice)
        .bind(&allowed)
        .fetch_optional(&mut **tx)
        .await?)
    }

    /// All auto-matched rows of a batch, read inside the bulk-confirm
    /// transaction.
    pub async fn tx_select_auto_matched(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        batch_id: Uuid,
    ) -> Result<Vec<AutoMatchedRow>> {
        Ok(sqlx::query_as::<_, AutoMatchedRow>(
            r#"
            SELECT id, matched_invoice_id, confidence_score
            FROM bank_transactions
            WHERE upload_batch_id = $1
              AND status = 'auto_matched'
              AND matched_invoice_id IS NOT NULL
            "#,
        )
        .bind(batch_id)
        .fetch_all(&mut **tx)
        .await?)
    }

    /// Confirm a set of rows, double-guarded on status so a concurrent
    /// per-row confirm makes at most one of the writers effective.
    pub async fn tx_bulk_confirm(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE bank_transactions
            SET status = 'confirmed'
            WHERE id = ANY($1) AND status = 'auto_matched'
            RETURNING id
            "#,
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
