//! Reconciliation service: HTTP surface, batch worker and wiring
//!
//! The pure matching core lives in `match-engine`; this crate owns the
//! impure shell around it: CSV streaming, the batch worker, the admin
//! state machine, listing/summary views and the axum routes.

pub mod config;
pub mod csv_stream;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod summary;
pub mod transitions;
pub mod worker;

use std::sync::Arc;

use job_queue::JobQueue;
use progress_mirror::ProgressMirror;
use recon_store::ReconStore;

use crate::config::Config;

/// Process-wide handles, wired once at startup and passed by value.
#[derive(Clone)]
pub struct AppState {
    pub store: ReconStore,
    pub mirror: Arc<dyn ProgressMirror>,
    pub queue: Arc<dyn JobQueue>,
    pub config: Arc<Config>,
}
