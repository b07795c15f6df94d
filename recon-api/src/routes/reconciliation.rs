// Batch endpoints: upload, listing, status, transactions page, summary

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use job_queue::BatchJob;
use recon_store::cursor::PageCursor;
use recon_store::models::{BatchStatus, TransactionStatus};
use recon_store::BatchListQuery;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::METRICS;
use crate::summary::{BatchStatusView, BatchSummary};
use crate::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 100;

fn parse_uuid(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid {what}: {raw}")))
}

fn page_limit(requested: Option<i64>) -> Result<i64, ApiError> {
    let limit = requested.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit < 1 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok(limit)
}

// ===== UPLOAD =====

/// POST /reconciliation/upload - multipart CSV, creates a batch and
/// enqueues the processing job. 202 with the batch id.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or("upload.csv")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("could not read upload: {e}")))?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))?;
    if data.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(ApiError::bad_request("uploaded file must be a CSV"));
    }

    let batch = state.store.create_batch(&filename).await?;
    METRICS.batches_created_total.inc();

    let upload_dir = &state.config.worker.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("could not create upload dir: {e}")))?;

    let file_path = format!("{}/{}.csv", upload_dir, batch.id);
    if let Err(e) = tokio::fs::write(&file_path, &data).await {
        error!("Failed to spool upload for batch {}: {}", batch.id, e);
        let _ = state.store.mark_batch_failed(batch.id).await;
        return Err(ApiError::Internal("could not store uploaded file".to_string()));
    }

    let job = BatchJob {
        batch_id: batch.id,
        file_path,
    };
    if let Err(e) = state.queue.enqueue(&job).await {
        error!("Failed to dispatch batch {}: {}", batch.id, e);
        let _ = state.store.mark_batch_failed(batch.id).await;
        return Err(ApiError::Internal("could not dispatch batch job".to_string()));
    }

    info!("Accepted upload {} as batch {}", batch.filename, batch.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "batchId": batch.id })),
    ))
}

// ===== LISTING =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBatchesParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// GET /reconciliation - offset-paginated batch listing with sorting.
pub async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<ListBatchesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(params.limit)?;
    let offset = params.offset.unwrap_or(0).max(0);

    if let Some(status) = params.status.as_deref() {
        if BatchStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!("unknown batch status: {status}")));
        }
    }

    let sort_by_updated = match params.sort_by.as_deref() {
        None | Some("createdAt") => false,
        Some("updatedAt") => true,
        Some(other) => {
            return Err(ApiError::bad_request(format!("unknown sortBy: {other}")));
        }
    };

    let ascending = match params.sort_order.as_deref() {
        None | Some("desc") => false,
        Some("asc") => true,
        Some(other) => {
            return Err(ApiError::bad_request(format!("unknown sortOrder: {other}")));
        }
    };

    let (batches, total) = state
        .store
        .list_batches(&BatchListQuery {
            status: params.status,
            limit,
            offset,
            sort_by_updated,
            ascending,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "batches": batches,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

// ===== STATUS =====

/// GET /reconciliation/:batchId - current status and progress. Served
/// from the mirror when it is ahead of the store, from the store
/// otherwise.
pub async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchStatusView>, ApiError> {
    let batch_id = parse_uuid(&batch_id, "batch id")?;

    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch", batch_id.to_string()))?;

    let view = match state.mirror.get(batch_id).await {
        Some(progress) => BatchStatusView::from_mirror(&batch, &progress),
        None => BatchStatusView::from_batch(&batch),
    };

    Ok(Json(view))
}

// ===== TRANSACTIONS PAGE =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransactionsParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub status: Option<String>,
}

/// GET /reconciliation/:batchId/transactions - cursor-paginated page in
/// `(created_at DESC, id DESC)` order.
pub async fn batch_transactions(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    Query(params): Query<BatchTransactionsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch_id = parse_uuid(&batch_id, "batch id")?;
    let limit = page_limit(params.limit)?;

    state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch", batch_id.to_string()))?;

    if let Some(status) = params.status.as_deref() {
        if TransactionStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!(
                "unknown transaction status: {status}"
            )));
        }
    }

    let cursor = params
        .cursor
        .as_deref()
        .map(PageCursor::decode)
        .transpose()?;

    let (rows, has_more) = state
        .store
        .list_batch_transactions(batch_id, params.status.as_deref(), cursor, limit)
        .await?;

    let next_cursor = if has_more {
        rows.last()
            .map(|last| PageCursor::new(last.created_at, last.id).encode())
    } else {
        None
    };

    Ok(Json(serde_json::json!({
        "data": rows,
        "nextCursor": next_cursor,
        "hasMore": has_more,
    })))
}

// ===== SUMMARY =====

/// GET /reconciliation/:batchId/summary - derived counters and timing.
pub async fn batch_summary(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchSummary>, ApiError> {
    let batch_id = parse_uuid(&batch_id, "batch id")?;

    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("batch", batch_id.to_string()))?;

    Ok(Json(BatchSummary::from_batch(&batch)))
}
