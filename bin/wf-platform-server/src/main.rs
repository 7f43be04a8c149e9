//! Wyffle Platform Server
//!
//! Serves the platform REST API, the document file route and Swagger UI, with
//! a second port for metrics and health. Also runs the retention sweeper and,
//! with the in-memory store, an in-process outbox dispatcher.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `WF_API_PORT` | `3000` | HTTP API port |
//! | `WF_METRICS_PORT` | `9090` | Metrics/health port |
//! | `WF_STORE` | `mongo` | `mongo`, or `memory` for local development |
//! | `WF_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `WF_MONGO_DB` | `wyffle` | MongoDB database name |
//! | `WF_CORS_ORIGINS` | `http://localhost:5173` | Comma-separated allowed origins |
//! | `WF_LOCAL_GATEWAY_SECRET` | `local-dev-secret` | Signing secret when Razorpay is not configured |
//! | `WF_LOG_JSON` | `false` | JSON log output |
//! | `RUST_LOG` | `info` | Log level |
//!
//! Authentication, pricing, Razorpay, storage and retention settings are read
//! by `PlatformConfig::from_env`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{http::HeaderValue, response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::sync::broadcast;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use wf_common::env::{env_flag, env_or, env_or_parse};
use wf_common::logging::init_tracing;
use wf_outbox::{
    LogMailer, Mailer, MemoryOutboxRepository, OutboxProcessor, OutboxProcessorConfig, SmtpConfig,
    SmtpMailer, TemplateContext,
};
use wf_platform::api::{platform_router, ApiDoc, PlatformServices};
use wf_platform::repository::{MemoryStore, MongoStore};
use wf_platform::service::{DocumentStorage, LocalGateway, PaymentGateway, RazorpayGateway, RetentionSweeper};
use wf_platform::PlatformConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(env_flag("WF_LOG_JSON", false));

    info!("Starting Wyffle Platform Server");

    let api_port: u16 = env_or_parse("WF_API_PORT", 3000);
    let metrics_port: u16 = env_or_parse("WF_METRICS_PORT", 9090);
    let store_kind = env_or("WF_STORE", "mongo");
    let config = PlatformConfig::from_env()?;

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = Vec::new();

    let gateway: Arc<dyn PaymentGateway> = match &config.razorpay {
        Some(razorpay) => {
            info!(api_url = %razorpay.api_url, "Razorpay gateway configured");
            Arc::new(RazorpayGateway::new(razorpay.clone())?)
        }
        None => {
            warn!("RAZORPAY_KEY_ID/RAZORPAY_KEY_SECRET not set, using the local development gateway");
            Arc::new(LocalGateway::new(env_or("WF_LOCAL_GATEWAY_SECRET", "local-dev-secret")))
        }
    };
    let storage = DocumentStorage::from_config(&config.storage)?;

    let services = match store_kind.as_str() {
        "memory" => {
            warn!("Using the in-memory store, data is lost on restart");
            let store = MemoryStore::new();

            let processor = OutboxProcessor::new(
                Arc::new(MemoryOutboxRepository::shared(store.outbox_handle())),
                mailer()?,
                TemplateContext::from_env(),
                OutboxProcessorConfig::from_env(),
            );
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = processor.start() => {}
                    _ = shutdown_rx.recv() => info!("In-process outbox dispatcher shutting down"),
                }
            }));

            PlatformServices::build(Arc::new(store), &config, gateway, storage)?
        }
        "mongo" => {
            let mongo_url = env_or("WF_MONGO_URL", "mongodb://localhost:27017");
            let mongo_db = env_or("WF_MONGO_DB", "wyffle");
            info!("Connecting to MongoDB: {}/{}", mongo_url, mongo_db);

            let client = mongodb::Client::with_uri_str(&mongo_url).await?;
            let db = client.database(&mongo_db);
            let store = MongoStore::new(client, &db);
            store.ensure_indexes().await?;

            PlatformServices::build(Arc::new(store), &config, gateway, storage)?
        }
        other => anyhow::bail!("Unknown WF_STORE value: {}. Use mongo or memory", other),
    };

    if let Some(uid) = &config.bootstrap_admin_uid {
        if services.claims.bootstrap_admin(uid).await? {
            info!(uid = %uid, "Bootstrap administrator granted");
        }
    }

    if config.retention.enabled {
        let sweeper = RetentionSweeper::new(services.retention.clone());
        tasks.push(tokio::spawn(sweeper.run(shutdown_tx.subscribe())));
    }

    let app = platform_router(&services)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&env_or("WF_CORS_ORIGINS", "http://localhost:5173")));

    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("API server listening on http://{}", api_addr);
    let api_listener = TcpListener::bind(&api_addr).await?;
    {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            axum::serve(api_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        }));
    }

    let metrics_addr = format!("0.0.0.0:{}", metrics_port);
    info!("Metrics server listening on http://{}/metrics", metrics_addr);
    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let metrics_app = metrics_router(prometheus);
        tasks.push(tokio::spawn(async move {
            axum::serve(metrics_listener, metrics_app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        }));
    }

    info!("Wyffle Platform Server started");
    info!("Press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(30), async {
        for task in tasks {
            let _ = task.await;
        }
    })
    .await;

    info!("Wyffle Platform Server shutdown complete");
    Ok(())
}

fn mailer() -> Result<Arc<dyn Mailer>> {
    Ok(match SmtpConfig::from_env() {
        Some(smtp) => Arc::new(SmtpMailer::from_config(&smtp)?),
        None => Arc::new(LogMailer::new()),
    })
}

fn cors_layer(origins: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
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
