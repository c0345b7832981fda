//! HTTP surface for DMO extraction: one multipart route per configured
//! endpoint plus `/health`.

pub mod config;
pub mod error;
pub mod form;
pub mod routes;
pub mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use mobvis_core::GaitEngine;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::{ApiConfig, ConfigError, CorsConfig, EndpointConfig};
pub use error::ApiError;
pub use state::AppState;

pub fn build_router(config: &ApiConfig, engine: Arc<dyn GaitEngine>) -> Result<Router, ConfigError> {
    config.validate()?;

    let mut router: Router = Router::new()
        .route("/health", get(routes::health))
        .with_state(Arc::clone(&engine));

    for endpoint in &config.endpoints {
        let state = AppState::new(Arc::clone(&engine), endpoint.clone());
        router = router.merge(
            Router::new()
                .route(&endpoint.path, post(routes::dmo_extraction))
                .with_state(state),
        );
    }

    Ok(router
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors)?))
}

fn cors_layer(cors: &CorsConfig) -> Result<CorsLayer, ConfigError> {
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors.origin_values()?))
        .allow_credentials(cors.allow_credentials)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

pub async fn serve(config: ApiConfig, engine: Arc<dyn GaitEngine>) -> Result<()> {
    let router = build_router(&config, engine)?;
    let listener = TcpListener::bind(config.bind_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(
        endpoints = ?config.endpoints.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
        "listening on {}",
        listener.local_addr()?
    );
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
