//! HTTP API module - stateless decision endpoints

mod permissions;

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;

/// Build the API router
pub fn router(config: &Config) -> Router {
    let cors = if config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(permissions::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "labgate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}
