//! Admin API handlers.

pub mod content_api;
pub mod scraper_api;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::AppState;

/// Success envelope around `data`.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Success envelope with pagination metadata.
pub fn ok_paginated<T: Serialize>(data: T, page: usize, limit: usize, total: u64) -> Json<Value> {
    let total_pages = if limit > 0 {
        (total as usize).div_ceil(limit)
    } else {
        0
    };
    Json(json!({
        "success": true,
        "data": data,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total_pages,
        }
    }))
}

/// Liveness probe: uptime plus store connectivity.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.db.ping();
    ok(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "store": if store_ok { "connected" } else { "unreachable" },
    }))
}
