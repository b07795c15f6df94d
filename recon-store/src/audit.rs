// Append-only match audit log

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{MatchAuditEntry, NewAuditEntry};
use crate::ReconStore;

const BULK_INSERT_SQL: &str = r#"
    INSERT INTO match_audit_log (
        transaction_id, action, previous_invoice_id,
        new_invoice_id, performed_by, reason
    )
    SELECT * FROM UNNEST(
        $1::uuid[], $2::text[], $3::uuid[],
        $4::uuid[], $5::text[], $6::text[]
    )
"#;

struct AuditColumns {
    transaction_ids: Vec<Uuid>,
    actions: Vec<String>,
    previous: Vec<Option<Uuid>>,
    new: Vec<Option<Uuid>>,
    performed_by: Vec<String>,
    reasons: Vec<Option<String>>,
}

fn to_columns(entries: &[NewAuditEntry]) -> AuditColumns {
    let mut columns = AuditColumns {
        transaction_ids: Vec::with_capacity(entries.len()),
        actions: Vec::with_capacity(entries.len()),
        previous: Vec::with_capacity(entries.len()),
        new: Vec::with_capacity(entries.len()),
        performed_by: Vec::with_capacity(entries.len()),
        reasons: Vec::with_capacity(entries.len()),
    };

    for entry in entries {
        columns.transaction_ids.push(entry.transaction_id);
        columns.actions.push(entry.action.clone());
        columns.previous.push(entry.previous_invoice_id);
        columns.new.push(entry.new_invoice_id);
        columns.performed_by.push(entry.performed_by.clone());
        columns.reasons.push(entry.reason.clone());
    }

    columns
}

impl ReconStore {
    /// Single round-trip bulk append, used by the worker for auto-matches.
    pub async fn bulk_insert_audit(&self, entries: &[NewAuditEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let columns = to_columns(entries);
        let inserted = sqlx::query(BULK_INSERT_SQL)
            .bind(&columns.transaction_ids)
            .bind(&columns.actions)
            .bind(&columns.previous)
            .bind(&columns.new)
            .bind(&columns.performed_by)
            .bind(&columns.reasons)
            .execute(&self.pool)
            .await?;

        Ok(inserted.rows_affected())
    }

    /// Audit entries for one transaction, newest first.
    pub async fn list_audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<MatchAuditEntry>> {
        Ok(sqlx::query_as::<_, MatchAuditEntry>(
            r#"
            SELECT * FROM match_audit_log
            WHERE transaction_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Append one audit entry inside an admin-action transaction.
    pub async fn tx_insert_audit(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        entry: &NewAuditEntry,
    ) -> Result<MatchAuditEntry> {
        Ok(sqlx::query_as::<_, MatchAuditEntry>(
            r#"
            INSERT INTO match_audit_log (
                transaction_id, action, previous_invoice_id,
                new_invoice_id, performed_by, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.transaction_id)
        .bind(&entry.action)
        .bind(entry.previous_invoice_id)
        .bind(entry.new_invoice_id)
        .bind(&entry.performed_by)
        .bind(&entry.reason)
        .fetch_one(&mut **tx)
        .await?)
    }

    /// Bulk append inside the bulk-confirm transaction.
    pub async fn tx_bulk_insert_audit(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        entries: &[NewAuditEntry],
    ) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let columns = to_columns(entries);
        let inserted = sqlx::query(BULK_INSERT_SQL)
            .bind(&columns.transaction_ids)
            .bind(&columns.actions)
            .bind(&columns.previous)
            .bind(&columns.new)
            .bind(&columns.performed_by)
            .bind(&columns.reasons)
            .execute(&mut **tx)
            .await?;

        Ok(inserted.rows_affected())
    }
}
