// HTTP routes for the reconciliation service

pub mod health;
pub mod invoices;
pub mod reconciliation;
pub mod transactions;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

/// Routes served under the configurable API prefix (default `/api/v1`).
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/reconciliation/upload", post(reconciliation::upload))
        .route("/reconciliation", get(reconciliation::list_batches))
        .route("/reconciliation/:batch_id", get(reconciliation::batch_status))
        .route(
            "/reconciliation/:batch_id/transactions",
            get(reconciliation::batch_transactions),
        )
        .route(
            "/reconciliation/:batch_id/summary",
            get(reconciliation::batch_summary),
        )
        .route("/transactions/bulk-confirm", post(transactions::bulk_confirm))
        .route("/transactions/:id/confirm", post(transactions::confirm))
        .route("/transactions/:id/reject", post(transactions::reject))
        .route("/transactions/:id/match", post(transactions::manual_match))
        .route("/transactions/:id/external", post(transactions::mark_external))
        .route("/transactions/:id/audit", get(transactions::audit_trail))
        .route("/transactions/:id", get(transactions::get_transaction))
        .route("/invoices/search", get(invoices::search))
        .route("/invoices/candidates", get(invoices::candidates))
        .route("/invoices/by-number/:number", get(invoices::by_number))
        .route("/invoices/:id", get(invoices::by_id))
}

/// Root-level operational routes.
pub fn ops_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(health::metrics))
}
