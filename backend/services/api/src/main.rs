mod error;
mod extractors;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use mca_common::types::ServiceInfo;
use mca_config::{init_tracing, AppConfig};
use mca_db::source::pg_repository::PgSourceRepository;
use mca_db::source::repositories::SourceRepository;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn SourceRepository>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("mca-api"))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-funder-id"),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(sync::router())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&config.log_level);
    tracing::info!(service = "mca-api", "starting");

    let pool = mca_db::create_pool(&config.database_url).await?;
    let state = AppState {
        source: Arc::new(PgSourceRepository::new(pool)),
    };

    let app = build_router(state);
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind_addr()))?;

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
