//! Wyffle Outbox Processor
//!
//! Drains the platform's outbox collection and sends the notification emails.
//! Without SMTP settings every email is logged instead of sent.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `WF_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `WF_MONGO_DB` | `wyffle` | MongoDB database name |
//! | `WF_OUTBOX_COLLECTION` | `outbox` | Outbox collection name |
//! | `WF_OUTBOX_POLL_INTERVAL_MS` | `1000` | Poll interval in milliseconds |
//! | `WF_OUTBOX_BATCH_SIZE` | `50` | Max items per batch |
//! | `WF_OUTBOX_MAX_ATTEMPTS` | `5` | Deliveries before an item is parked as FAILED |
//! | `WF_OUTBOX_STUCK_TIMEOUT_SECS` | `300` | Age after which PROCESSING items are reclaimed |
//! | `WF_SMTP_HOST` / `WF_SMTP_FROM` | - | SMTP relay and sender (both required to send) |
//! | `WF_FRONTEND_URL` | `http://localhost:5173` | Dashboard link in emails |
//! | `WF_ADMIN_EMAIL` | - | Receives new-application notices |
//! | `WF_METRICS_PORT` | `9091` | Metrics/health port |
//! | `RUST_LOG` | `info` | Log level |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use wf_common::env::{env_flag, env_or, env_or_parse};
use wf_common::logging::init_tracing;
use wf_outbox::mongo::MongoOutboxRepository;
use wf_outbox::{
    LogMailer, Mailer, OutboxProcessor, OutboxProcessorConfig, SmtpConfig, SmtpMailer, TemplateContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(env_flag("WF_LOG_JSON", false));

    info!("Starting Wyffle Outbox Processor");

    let mongo_url = env_or("WF_MONGO_URL", "mongodb://localhost:27017");
    let mongo_db = env_or("WF_MONGO_DB", "wyffle");
    let collection = env_or("WF_OUTBOX_COLLECTION", "outbox");
    let metrics_port: u16 = env_or_parse("WF_METRICS_PORT", 9091);
    let config = OutboxProcessorConfig::from_env();

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    info!("Connecting to MongoDB: {}/{}", mongo_url, mongo_db);
    let client = mongodb::Client::with_uri_str(&mongo_url).await?;
    let repository = Arc::new(MongoOutboxRepository::new(client, &mongo_db, &collection));

    let mailer: Arc<dyn Mailer> = match SmtpConfig::from_env() {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
            Arc::new(SmtpMailer::from_config(&smtp)?)
        }
        None => {
            warn!("WF_SMTP_HOST/WF_SMTP_FROM not set, emails will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    info!(
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        batch_size = config.batch_size,
        max_attempts = config.max_attempts,
        "Outbox processor configured"
    );
    let processor = OutboxProcessor::new(repository, mailer, TemplateContext::from_env(), config);

    let processor_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = processor.start() => {}
                _ = shutdown_rx.recv() => {
                    info!("Outbox processor shutting down");
                }
            }
        })
    };

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    info!("Metrics server listening on http://{}/metrics", metrics_addr);

    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    let metrics_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let app = metrics_router(prometheus);
        tokio::spawn(async move {
            axum::serve(metrics_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        })
    };

    info!("Wyffle Outbox Processor started");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(30), async {
        let _ = processor_handle.await;
        let _ = metrics_handle.await;
    })
    .await;

    info!("Wyffle Outbox Processor shutdown complete");
    Ok(())
}

fn metrics_router(prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let prometheus = prometheus.clone();
                async move { prometheus.render() }
            }),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "READY"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
