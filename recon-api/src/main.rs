// Reconciliation service entry point: wires the store, mirror, queue and
// HTTP surface together

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use job_queue::{InProcessQueue, JetStreamQueue, JobQueue, QueueConfig};
use progress_mirror::{NoopMirror, ProgressMirror, RedisMirror};
use recon_api::config::Config;
use recon_api::routes;
use recon_api::worker::BatchWorker;
use recon_api::AppState;
use recon_store::ReconStore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("🚀 Starting reconciliation service");

    let store = ReconStore::connect(&config.database.url, config.database.max_connections).await?;
    info!("Database ready, migrations applied");

    // Progress mirror: advisory, so startup never fails on Redis
    let mirror: Arc<dyn ProgressMirror> = match &config.redis.url {
        Some(url) => match RedisMirror::connect(url).await {
            Ok(mirror) => Arc::new(mirror),
            Err(e) => {
                warn!("Redis unavailable ({}); progress mirror disabled", e);
                Arc::new(NoopMirror)
            }
        },
        None => {
            info!("REDIS_URL not set; progress mirror disabled");
            Arc::new(NoopMirror)
        }
    };

    let worker = Arc::new(BatchWorker::new(store.clone(), mirror.clone()));
    let in_process: Arc<dyn JobQueue> = Arc::new(InProcessQueue::new(worker.clone()));

    // Job queue: JetStream when configured, in-process execution otherwise
    let queue: Arc<dyn JobQueue> = match &config.nats.url {
        Some(url) => {
            let queue_config = QueueConfig {
                concurrency: config.worker.concurrency,
                ..Default::default()
            };
            match JetStreamQueue::connect(url, queue_config).await {
                Ok(jetstream) => match jetstream.start_consumers(worker.clone()).await {
                    Ok(()) => Arc::new(jetstream.with_fallback(in_process.clone())),
                    Err(e) => {
                        warn!("Queue consumers failed to start ({}); running in-process", e);
                        in_process.clone()
                    }
                },
                Err(e) => {
                    warn!("NATS unavailable ({}); running batches in-process", e);
                    in_process.clone()
                }
            }
        }
        None => {
            info!("NATS_URL not set; batches run in-process");
            in_process.clone()
        }
    };

    let cors = if config.server.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let state = AppState {
        store,
        mirror,
        queue,
        config: config.clone(),
    };

    let app = Router::new()
        .merge(routes::ops_router())
        .nest(&config.server.api_prefix, routes::api_router())
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("✅ recon-api listening on {}", bind_addr);
    info!("   API prefix: {}", config.server.api_prefix);

    axum::serve(listener, app).await?;

    Ok(())
}
