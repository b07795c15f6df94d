//! Authoritative store for the reconciliation engine
//!
//! PostgreSQL system of record for invoices, batches, bank transactions
//! and the append-only match audit log. All cross-component invariants
//! live here; the progress mirror and job queue are advisory layers on
//! top of this store.

pub mod cursor;
pub mod error;
pub mod models;

mod audit;
mod batches;
mod invoices;
mod transactions;

pub use batches::BatchListQuery;
pub use invoices::InvoiceSearch;
pub use transactions::InvoiceEffect;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::error::Result;

/// Handle to the authoritative store. Cheap to clone; wraps the shared
/// connection pool.
#[derive(Clone)]
pub struct ReconStore {
    pool: PgPool,
}

impl ReconStore {
    pub fn new(pool: PgPool) -> Self {
        ReconStore { pool }
    }

    /// Connect a pool and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = ReconStore::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction for the admin state machine: status update and
    /// audit append commit atomically or not at all.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Readiness probe.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
