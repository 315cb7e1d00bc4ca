//! Route configuration and setup

use crate::auth::{auth_middleware, JwtVerifier};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, patch, post},
    Json, Router,
};
use shelf_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Room for text fields and multipart framing on top of the two files.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Setup all application routes with CORS and request tracing
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let verifier = Arc::new(JwtVerifier::new(&config.base.jwt_secret));

    Ok(app_router(state, verifier)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Public health route plus the authenticated book routes.
pub fn app_router(state: Arc<AppState>, verifier: Arc<JwtVerifier>) -> Router {
    let body_limit = state
        .staging
        .max_upload_bytes
        .saturating_mul(2)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let book_routes = Router::new()
        .route("/api/books", post(handlers::books::create_book))
        .route(
            "/api/books/{book_id}",
            patch(handlers::books::update_book).delete(handlers::books::delete_book),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            verifier,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .route("/", get(health))
        .merge(book_routes)
        // Per-file limits are enforced while staging
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Ok" }))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.base.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .base
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_DOMAIN origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
