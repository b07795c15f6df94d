// Admin endpoints: per-transaction dispositions, bulk confirm, detail views

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::transitions::{self, AdminAction};
use crate::AppState;

fn parse_uuid(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid {what}: {raw}")))
}

/// Body shared by confirm / reject / external. All fields optional; a
/// missing body is treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBody {
    pub performed_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualMatchBody {
    pub invoice_id: Option<String>,
    pub performed_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConfirmBody {
    pub batch_id: Option<String>,
    pub performed_by: Option<String>,
}

async fn apply(
    state: &AppState,
    raw_id: &str,
    action: AdminAction,
    performed_by: Option<String>,
    reason: Option<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction_id = parse_uuid(raw_id, "transaction id")?;

    let outcome =
        transitions::apply_admin_action(&state.store, transaction_id, action, performed_by, reason)
            .await?;

    Ok(Json(serde_json::json!({
        "transaction": outcome.transaction,
        "auditLogId": outcome.audit.id,
    })))
}

/// POST /transactions/:id/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ActionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    apply(&state, &id, AdminAction::Confirm, body.performed_by, body.reason).await
}

/// POST /transactions/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ActionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    apply(&state, &id, AdminAction::Reject, body.performed_by, body.reason).await
}

/// POST /transactions/:id/match - manual match to a supplied invoice.
pub async fn manual_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ManualMatchBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let invoice_raw = body
        .invoice_id
        .ok_or_else(|| ApiError::bad_request("invoiceId is required"))?;
    let invoice_id = parse_uuid(&invoice_raw, "invoice id")?;

    apply(
        &state,
        &id,
        AdminAction::ManualMatch(invoice_id),
        body.performed_by,
        body.reason,
    )
    .await
}

/// POST /transactions/:id/external
pub async fn mark_external(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ActionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    apply(
        &state,
        &id,
        AdminAction::MarkExternal,
        body.performed_by,
        body.reason,
    )
    .await
}

/// POST /transactions/bulk-confirm - confirm every auto-matched row in a
/// batch.
pub async fn bulk_confirm(
    State(state): State<AppState>,
    body: Option<Json<BulkConfirmBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let batch_raw = body
        .batch_id
        .ok_or_else(|| ApiError::bad_request("batchId is required"))?;
    let batch_id = parse_uuid(&batch_raw, "batch id")?;

    let (confirmed_count, transaction_ids) =
        transitions::bulk_confirm_auto(&state.store, batch_id, body.performed_by).await?;

    Ok(Json(serde_json::json!({
        "confirmedCount": confirmed_count,
        "transactionIds": transaction_ids,
    })))
}

/// GET /transactions/:id - transaction with its matched invoice and full
/// audit trail.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction_id = parse_uuid(&id, "transaction id")?;

    let transaction = state
        .store
        .get_transaction(transaction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("transaction", transaction_id.to_string()))?;

    let matched_invoice = match transaction.matched_invoice_id {
        Some(invoice_id) => state.store.get_invoice(invoice_id).await?,
        None => None,
    };

    let audit_log = state
        .store
        .list_audit_for_transaction(transaction_id)
        .await?;

    Ok(Json(serde_json::json!({
        "transaction": transaction,
        "matchedInvoice": matched_invoice,
        "auditLog": audit_log,
    })))
}

/// GET /transactions/:id/audit - audit entries newest-first.
pub async fn audit_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction_id = parse_uuid(&id, "transaction id")?;
    let entries = state
        .store
        .list_audit_for_transaction(transaction_id)
        .await?;
    Ok(Json(entries))
}
