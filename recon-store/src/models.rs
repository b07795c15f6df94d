use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ===== INVOICES =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            _ => None,
        }
    }
}

/// Projection used for candidate lookup; one bulk query per worker chunk.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateInvoiceRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

// ===== RECONCILIATION BATCHES =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationBatch {
    pub id: Uuid,
    pub filename: String,
    pub status: String,
    pub total_transactions: i32,
    pub processed_count: i32,
    pub auto_matched_count: i32,
    pub needs_review_count: i32,
    pub unmatched_count: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Uploading => "uploading",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(BatchStatus::Uploading),
            "processing" => Some(BatchStatus::Processing),
            "completed" => Some(BatchStatus::Completed),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

/// Additive counter update applied per worker chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterDelta {
    pub processed: i32,
    pub auto_matched: i32,
    pub needs_review: i32,
    pub unmatched: i32,
}

// ===== BANK TRANSACTIONS =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: Uuid,
    pub upload_batch_id: Uuid,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub reference_number: Option<String>,
    pub status: String,
    pub matched_invoice_id: Option<Uuid>,
    pub confidence_score: Option<Decimal>,
    pub match_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    AutoMatched,
    NeedsReview,
    Unmatched,
    Confirmed,
    External,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::AutoMatched => "auto_matched",
            TransactionStatus::NeedsReview => "needs_review",
            TransactionStatus::Unmatched => "unmatched",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "auto_matched" => Some(TransactionStatus::AutoMatched),
            "needs_review" => Some(TransactionStatus::NeedsReview),
            "unmatched" => Some(TransactionStatus::Unmatched),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "external" => Some(TransactionStatus::External),
            _ => None,
        }
    }
}

/// Insert payload for the worker's bulk writes; ids and created_at are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBankTransaction {
    pub upload_batch_id: Uuid,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub reference_number: Option<String>,
    pub status: String,
    pub matched_invoice_id: Option<Uuid>,
    pub confidence_score: Option<Decimal>,
    pub match_details: serde_json::Value,
}

/// Projection used when recovering inserted auto-matches for the audit pass.
#[derive(Debug, Clone, FromRow)]
pub struct AutoMatchedRow {
    pub id: Uuid,
    pub matched_invoice_id: Uuid,
    pub confidence_score: Option<Decimal>,
}

// ===== MATCH AUDIT LOG =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MatchAuditEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub action: String,
    pub previous_invoice_id: Option<Uuid>,
    pub new_invoice_id: Option<Uuid>,
    pub performed_by: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AutoMatched,
    Confirmed,
    Rejected,
    ManualMatched,
    MarkedExternal,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AutoMatched => "auto_matched",
            AuditAction::Confirmed => "confirmed",
            AuditAction::Rejected => "rejected",
            AuditAction::ManualMatched => "manual_matched",
            AuditAction::MarkedExternal => "marked_external",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub transaction_id: Uuid,
    pub action: String,
    pub previous_invoice_id: Option<Uuid>,
    pub new_invoice_id: Option<Uuid>,
    pub performed_by: String,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::AutoMatched,
            TransactionStatus::NeedsReview,
            TransactionStatus::Unmatched,
            TransactionStatus::Confirmed,
            TransactionStatus::External,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }

        for status in [
            BatchStatus::Uploading,
            BatchStatus::Processing,
            BatchStatus::Completed,
            BatchStatus::Failed,
        ] {
            assert_eq!(BatchStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert_eq!(TransactionStatus::parse("CONFIRMED"), None);
        assert_eq!(BatchStatus::parse("done"), None);
        assert_eq!(InvoiceStatus::parse(""), None);
    }

    #[test]
    fn test_terminal_batch_statuses() {
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(!BatchStatus::Processing.is_terminal());
        assert!(!BatchStatus::Uploading.is_terminal());
    }
}
