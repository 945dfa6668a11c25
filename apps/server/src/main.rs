// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Roofline Server - roof-line overlay generation over HTTP.
//!
//! Wires the reconstruction pipeline to its concrete collaborators: a
//! building footprint service, a messages-style vision oracle, and an
//! optional PostgreSQL table of tenant corrections.
//!
//! # Endpoints
//!
//! - `GET /` - API information
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/overlay` - Generate an overlay for one building
//! - `GET /api/v1/overlay/:key` - Retrieve cached overlay

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use roofline_core::{
    CorrectionStore, NoCorrections, OracleAlignmentVerifier, OracleFeatureDetector,
    RoofLinePipeline, VisionOracle,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::{DiskCache, HttpPerimeterSource, HttpVisionOracle, PgCorrectionStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RoofLinePipeline>,
    pub cache: Arc<DiskCache>,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,roofline_server=debug"));

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allows_any() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

fn correction_store(config: &Config) -> anyhow::Result<Arc<dyn CorrectionStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect_lazy(url)?;
            Ok(Arc::new(PgCorrectionStore::new(pool)))
        }
        None => {
            tracing::info!("DATABASE_URL not set, tenant corrections disabled");
            Ok(Arc::new(NoCorrections))
        }
    }
}

fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(routes::health::info))
        .route("/api/v1/health", get(routes::health::check))
        .route("/api/v1/overlay", post(routes::overlay::create_overlay))
        .route("/api/v1/overlay/:key", get(routes::overlay::get_overlay))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        cache_dir = %config.cache_dir,
        cache_max_age_days = config.cache_max_age_days,
        oracle_url = %config.oracle_url,
        perimeter_source_url = %config.perimeter_source_url,
        snap_tolerance_ft = config.pipeline.snap_tolerance_ft,
        max_alignment_attempts = config.pipeline.max_alignment_attempts,
        "Starting Roofline Server"
    );

    let port = config.port;
    let cache = Arc::new(DiskCache::new(&config.cache_dir, config.cache_max_age()).await);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let oracle: Arc<dyn VisionOracle> = Arc::new(HttpVisionOracle::new(
        http.clone(),
        &config.oracle_url,
        config.oracle_api_key.clone(),
        &config.oracle_model,
        config.oracle_max_tokens,
    ));

    let pipeline = RoofLinePipeline::new(
        config.pipeline.clone(),
        Arc::new(HttpPerimeterSource::new(http.clone(), &config.perimeter_source_url)),
        Arc::new(OracleFeatureDetector::new(
            oracle.clone(),
            config.pipeline.review_confidence_threshold,
        )),
        Arc::new(OracleAlignmentVerifier::new(oracle)),
        correction_store(&config)?,
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        cache,
        config: Arc::new(config),
        http,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let config = Config::from_env();
        let http = reqwest::Client::new();
        let oracle: Arc<dyn VisionOracle> = Arc::new(HttpVisionOracle::new(
            http.clone(),
            "http://127.0.0.1:9/v1/messages",
            None,
            "test",
            16,
        ));
        let pipeline = RoofLinePipeline::new(
            config.pipeline.clone(),
            Arc::new(HttpPerimeterSource::new(http.clone(), "http://127.0.0.1:9/footprint")),
            Arc::new(OracleFeatureDetector::new(oracle.clone(), 70.0)),
            Arc::new(OracleAlignmentVerifier::new(oracle)),
            Arc::new(NoCorrections),
        );
        let dir = std::env::temp_dir().join(format!("roofline-server-{}", uuid::Uuid::new_v4()));
        AppState {
            pipeline: Arc::new(pipeline),
            cache: Arc::new(DiskCache::new(dir.to_str().unwrap(), config.cache_max_age()).await),
            config: Arc::new(config),
            http,
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(test_state().await)
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_coordinates_is_client_error() {
        let response = router(test_state().await)
            .oneshot(
                Request::post("/api/v1/overlay")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"address": "1 Main St"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "MISSING_COORDINATES");
    }

    #[tokio::test]
    async fn test_unknown_cache_key_is_not_found() {
        let response = router(test_state().await)
            .oneshot(Request::get("/api/v1/overlay/deadbeef").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
