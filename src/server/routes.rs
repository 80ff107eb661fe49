//! Router configuration for the admin API.

use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::handlers;
use super::AppState;

/// Build the admin API router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health))
        // Scraper control
        .route("/api/scraper/status", get(handlers::scraper_api::status))
        .route("/api/scraper/types", get(handlers::scraper_api::types))
        .route("/api/scraper/start", post(handlers::scraper_api::start_all))
        .route(
            "/api/scraper/start/:name",
            post(handlers::scraper_api::start_one),
        )
        .route("/api/scraper/stop", post(handlers::scraper_api::stop))
        .route("/api/scraper/logs", get(handlers::scraper_api::logs))
        .route(
            "/api/scraper/logs/:id",
            get(handlers::scraper_api::log_detail),
        )
        .route("/api/scraper/stats", get(handlers::scraper_api::stats))
        .route(
            "/api/scraper/file-logs/:filename",
            get(handlers::scraper_api::file_log),
        )
        // Content
        .route("/api/content", get(handlers::content_api::list))
        .route(
            "/api/content/stats/overview",
            get(handlers::content_api::stats_overview),
        )
        .route("/api/content/cleanup", post(handlers::content_api::cleanup))
        .route("/api/content/:id", get(handlers::content_api::detail))
        .route("/api/content/:id", delete(handlers::content_api::delete))
        .route(
            "/api/content/:id/status",
            patch(handlers::content_api::patch_status),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
