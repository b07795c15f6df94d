// Invoice endpoints: search and candidate lookup for manual matching

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use recon_store::models::InvoiceStatus;
use recon_store::InvoiceSearch;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 50;
const DEFAULT_CANDIDATE_LIMIT: i64 = 10;

fn parse_amount(raw: &str) -> Result<Decimal, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid amount: {raw}")))
}

fn search_limit(requested: Option<i64>, default: i64) -> Result<i64, ApiError> {
    let limit = requested.unwrap_or(default);
    if limit < 1 || limit > MAX_SEARCH_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}"
        )));
    }
    Ok(limit)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub amount: Option<String>,
    /// Comma-separated status list.
    pub status: Option<String>,
    pub include_paid: Option<bool>,
    pub limit: Option<i64>,
}

/// GET /invoices/search - amount within one cent, optional status set
/// (paid excluded unless requested), case-insensitive name substring.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = search_limit(params.limit, DEFAULT_SEARCH_LIMIT)?;
    let amount = params.amount.as_deref().map(parse_amount).transpose()?;

    let statuses = params
        .status
        .as_deref()
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    InvoiceStatus::parse(s)
                        .map(|status| status.as_str().to_string())
                        .ok_or_else(|| ApiError::bad_request(format!("unknown invoice status: {s}")))
                })
                .collect::<Result<Vec<String>, ApiError>>()
        })
        .transpose()?;

    let include_paid = params.include_paid.unwrap_or(false);

    let invoices = state
        .store
        .search_invoices(&InvoiceSearch {
            name_query: params.q.filter(|q| !q.trim().is_empty()),
            amount,
            exclude_paid: statuses.is_none() && !include_paid,
            statuses,
            limit,
        })
        .await?;

    Ok(Json(invoices))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesParams {
    pub amount: Option<String>,
    pub limit: Option<i64>,
}

/// GET /invoices/candidates - unpaid invoices within one cent of the
/// given amount.
pub async fn candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidatesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let amount_raw = params
        .amount
        .ok_or_else(|| ApiError::bad_request("amount is required"))?;
    let amount = parse_amount(&amount_raw)?;
    let limit = search_limit(params.limit, DEFAULT_CANDIDATE_LIMIT)?;

    let invoices = state.store.find_candidates_for_amount(amount, limit).await?;
    Ok(Json(invoices))
}

/// GET /invoices/:id
pub async fn by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("invalid invoice id: {id}")))?;

    let invoice = state
        .store
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("invoice", invoice_id.to_string()))?;

    Ok(Json(invoice))
}

/// GET /invoices/by-number/:n
pub async fn by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state
        .store
        .get_invoice_by_number(&number)
        .await?
        .ok_or_else(|| ApiError::NotFound("invoice", number))?;

    Ok(Json(invoice))
}
