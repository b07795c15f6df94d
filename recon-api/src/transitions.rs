// Admin state machine: validates transitions and applies them atomically
// with their audit entries

use std::collections::HashSet;

use recon_store::models::{
    AuditAction, BankTransaction, MatchAuditEntry, NewAuditEntry, TransactionStatus,
};
use recon_store::{InvoiceEffect, ReconStore};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::METRICS;

/// Actor recorded on worker-written audit rows. Reserved: admin calls may
/// not impersonate it.
pub const SYSTEM_ACTOR: &str = "system";

/// Default actor when an admin call does not identify itself.
pub const DEFAULT_ADMIN_ACTOR: &str = "admin";

pub const BULK_CONFIRM_REASON: &str = "Bulk confirmation of auto-matched transactions";

/// The four single-row admin actions. Bulk confirm is separate since it
/// operates on a batch, not one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Confirm,
    Reject,
    ManualMatch(Uuid),
    MarkExternal,
}

impl AdminAction {
    pub fn name(&self) -> &'static str {
        match self {
            AdminAction::Confirm => "confirm",
            AdminAction::Reject => "reject",
            AdminAction::ManualMatch(_) => "manual_match",
            AdminAction::MarkExternal => "mark_external",
        }
    }

    pub fn allowed_from(&self) -> &'static [TransactionStatus] {
        match self {
            AdminAction::Confirm => &[
                TransactionStatus::AutoMatched,
                TransactionStatus::NeedsReview,
            ],
            AdminAction::Reject => &[
                TransactionStatus::AutoMatched,
                TransactionStatus::NeedsReview,
            ],
            AdminAction::ManualMatch(_) => &[
                TransactionStatus::NeedsReview,
                TransactionStatus::Unmatched,
            ],
            AdminAction::MarkExternal => &[TransactionStatus::Unmatched],
        }
    }

    pub fn target(&self) -> TransactionStatus {
        match self {
            AdminAction::Confirm => TransactionStatus::Confirmed,
            AdminAction::Reject => TransactionStatus::Unmatched,
            AdminAction::ManualMatch(_) => TransactionStatus::Confirmed,
            AdminAction::MarkExternal => TransactionStatus::External,
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            AdminAction::Confirm => AuditAction::Confirmed,
            AdminAction::Reject => AuditAction::Rejected,
            AdminAction::ManualMatch(_) => AuditAction::ManualMatched,
            AdminAction::MarkExternal => AuditAction::MarkedExternal,
        }
    }

    pub fn invoice_effect(&self) -> InvoiceEffect {
        match self {
            AdminAction::Confirm => InvoiceEffect::Keep,
            AdminAction::Reject => InvoiceEffect::Clear,
            AdminAction::ManualMatch(invoice_id) => InvoiceEffect::Set(*invoice_id),
            AdminAction::MarkExternal => InvoiceEffect::Clear,
        }
    }
}

/// Result of a successful single-row action.
#[derive(Debug)]
pub struct AdminOutcome {
    pub transaction: BankTransaction,
    pub audit: MatchAuditEntry,
}

fn resolve_actor(performed_by: Option<String>) -> Result<String, ApiError> {
    let actor = performed_by
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_ACTOR.to_string());

    if actor == SYSTEM_ACTOR {
        return Err(ApiError::bad_request(
            "performedBy 'system' is reserved for worker-written audit entries",
        ));
    }

    Ok(actor)
}

/// Apply one admin action atomically: status-guarded UPDATE plus exactly
/// one audit append, committed together or not at all.
pub async fn apply_admin_action(
    store: &ReconStore,
    transaction_id: Uuid,
    action: AdminAction,
    performed_by: Option<String>,
    reason: Option<String>,
) -> Result<AdminOutcome, ApiError> {
    let actor = resolve_actor(performed_by)?;

    // Invoice existence is checked up front; invoices are never deleted,
    // so the answer cannot change under the transaction below
    if let AdminAction::ManualMatch(invoice_id) = action {
        if !store.invoice_exists(invoice_id).await? {
            return Err(ApiError::bad_request(format!(
                "Invoice does not exist: {invoice_id}"
            )));
        }
    }

    let mut tx = store.begin().await?;

    let current = store
        .tx_get_transaction(&mut tx, transaction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("transaction", transaction_id.to_string()))?;

    let current_status = TransactionStatus::parse(&current.status).ok_or_else(|| {
        ApiError::Internal(format!(
            "transaction {} has unrecognized status '{}'",
            transaction_id, current.status
        ))
    })?;

    if !action.allowed_from().contains(&current_status) {
        return Err(ApiError::InvalidState(format!(
            "cannot {} a transaction in status '{}'",
            action.name(),
            current.status
        )));
    }

    let allowed: Vec<&str> = action
        .allowed_from()
        .iter()
        .map(TransactionStatus::as_str)
        .collect();

    // The WHERE-status guard makes a losing concurrent writer observe
    // zero updated rows instead of silently double-applying
    let updated = store
        .tx_apply_transition(
            &mut tx,
            transaction_id,
            &allowed,
            action.target().as_str(),
            action.invoice_effect(),
        )
        .await?
        .ok_or_else(|| {
            ApiError::InvalidState(format!(
                "transaction {transaction_id} changed state concurrently; re-fetch and retry"
            ))
        })?;

    let audit = store
        .tx_insert_audit(
            &mut tx,
            &NewAuditEntry {
                transaction_id,
                action: action.audit_action().as_str().to_string(),
                previous_invoice_id: current.matched_invoice_id,
                new_invoice_id: updated.matched_invoice_id,
                performed_by: actor,
                reason,
            },
        )
        .await?;

    tx.commit().await.map_err(recon_store::error::StoreError::from)?;

    METRICS
        .admin_actions_total
        .with_label_values(&[action.name()])
        .inc();
    info!(
        "Transaction {} {} -> {}",
        transaction_id,
        current.status,
        updated.status
    );

    Ok(AdminOutcome {
        transaction: updated,
        audit,
    })
}

/// Confirm every auto-matched transaction in a batch. The status guard is
/// applied twice (SELECT and UPDATE), so rows confirmed concurrently by a
/// per-row call are skipped here and audited by whichever writer won.
pub async fn bulk_confirm_auto(
    store: &ReconStore,
    batch_id: Uuid,
    performed_by: Option<String>,
) -> Result<(usize, Vec<Uuid>), ApiError> {
    let actor = resolve_actor(performed_by)?;

    store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch", batch_id.to_string()))?;

    let mut tx = store.begin().await?;

    let candidates = store.tx_select_auto_matched(&mut tx, batch_id).await?;
    let ids: Vec<Uuid> = candidates.iter().map(|row| row.id).collect();

    let confirmed = store.tx_bulk_confirm(&mut tx, &ids).await?;
    let confirmed_set: HashSet<Uuid> = confirmed.iter().copied().collect();

    let entries: Vec<NewAuditEntry> = candidates
        .iter()
        .filter(|row| confirmed_set.contains(&row.id))
        .map(|row| NewAuditEntry {
            transaction_id: row.id,
            action: AuditAction::Confirmed.as_str().to_string(),
            previous_invoice_id: Some(row.matched_invoice_id),
            new_invoice_id: Some(row.matched_invoice_id),
            performed_by: actor.clone(),
            reason: Some(BULK_CONFIRM_REASON.to_string()),
        })
        .collect();

    store.tx_bulk_insert_audit(&mut tx, &entries).await?;

    tx.commit().await.map_err(recon_store::error::StoreError::from)?;

    METRICS
        .admin_actions_total
        .with_label_values(&["bulk_confirm"])
        .inc();
    info!(
        "Bulk-confirmed {} transactions in batch {}",
        confirmed.len(),
        batch_id
    );

    Ok((confirmed.len(), confirmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(
            AdminAction::Confirm.allowed_from(),
            &[
                TransactionStatus::AutoMatched,
                TransactionStatus::NeedsReview
            ]
        );
        assert_eq!(AdminAction::Confirm.target(), TransactionStatus::Confirmed);
        assert_eq!(AdminAction::Confirm.invoice_effect(), InvoiceEffect::Keep);

        assert_eq!(AdminAction::Reject.target(), TransactionStatus::Unmatched);
        assert_eq!(AdminAction::Reject.invoice_effect(), InvoiceEffect::Clear);

        let invoice = Uuid::from_u128(5);
        let manual = AdminAction::ManualMatch(invoice);
        assert_eq!(
            manual.allowed_from(),
            &[TransactionStatus::NeedsReview, TransactionStatus::Unmatched]
        );
        assert_eq!(manual.target(), TransactionStatus::Confirmed);
        assert_eq!(manual.invoice_effect(), InvoiceEffect::Set(invoice));

        assert_eq!(
            AdminAction::MarkExternal.allowed_from(),
            &[TransactionStatus::Unmatched]
        );
        assert_eq!(
            AdminAction::MarkExternal.target(),
            TransactionStatus::External
        );
    }

    #[test]
    fn test_confirmed_and_external_are_dead_ends() {
        for action in [
            AdminAction::Confirm,
            AdminAction::Reject,
            AdminAction::ManualMatch(Uuid::from_u128(1)),
            AdminAction::MarkExternal,
        ] {
            assert!(!action
                .allowed_from()
                .contains(&TransactionStatus::Confirmed));
            assert!(!action.allowed_from().contains(&TransactionStatus::External));
            assert!(!action.allowed_from().contains(&TransactionStatus::Pending));
        }
    }

    #[test]
    fn test_actor_resolution() {
        assert_eq!(resolve_actor(None).unwrap(), "admin");
        assert_eq!(resolve_actor(Some("  ".to_string())).unwrap(), "admin");
        assert_eq!(
            resolve_actor(Some("jane.doe".to_string())).unwrap(),
            "jane.doe"
        );
        assert!(resolve_actor(Some("system".to_string())).is_err());
    }

    #[test]
    fn test_audit_action_mapping() {
        assert_eq!(AdminAction::Confirm.audit_action(), AuditAction::Confirmed);
        assert_eq!(AdminAction::Reject.audit_action(), AuditAction::Rejected);
        assert_eq!(
            AdminAction::ManualMatch(Uuid::from_u128(1)).audit_action(),
            AuditAction::ManualMatched
        );
        assert_eq!(
            AdminAction::MarkExternal.audit_action(),
            AuditAction::MarkedExternal
        );
    }
}
