//! Content browsing and moderation endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::super::error::ApiError;
use super::super::AppState;
use super::{ok, ok_paginated};
use crate::models::{ContentCategory, ContentStatus};
use crate::repository::ContentQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub source: Option<String>,
    pub tags: Option<String>,
    pub keywords: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub min_relevance: Option<u8>,
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupBody {
    pub max_age_days: Option<i64>,
}

/// `GET /api/content`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = match query.content_type.as_deref() {
        Some(raw) => Some(
            ContentCategory::from_str(raw)
                .ok_or_else(|| ApiError::bad_request(format!("invalid type: {raw}")))?,
        ),
        None => None,
    };
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            ContentStatus::from_str(raw)
                .ok_or_else(|| ApiError::bad_request(format!("invalid status: {raw}")))?,
        ),
        None => None,
    };

    let content_query = ContentQuery {
        category,
        source: query.source,
        tags: split_list(query.tags),
        keywords: split_list(query.keywords),
        status,
        min_relevance: query.min_relevance,
        max_age_days: query.max_age_days,
        search: query.search,
        sort: query.sort,
        order: query.order,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };

    let (records, total) = state.db.content().find(&content_query)?;
    Ok(ok_paginated(
        records,
        content_query.page(),
        content_query.limit(),
        total,
    ))
}

/// `GET /api/content/{id}`. Bumps the view counter.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.content();
    if !repo.increment_views(&id)? {
        return Err(ApiError::not_found(format!("content {id} not found")));
    }
    let record = repo
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(format!("content {id} not found")))?;
    Ok(ok(record))
}

/// `DELETE /api/content/{id}`. Hard delete.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.content().delete(&id)? {
        return Err(ApiError::not_found(format!("content {id} not found")));
    }
    Ok(ok(json!({ "deleted": id })))
}

/// `PATCH /api/content/{id}/status`
pub async fn patch_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let status = ContentStatus::from_str(&body.status)
        .ok_or_else(|| ApiError::bad_request(format!("invalid status: {}", body.status)))?;
    if !state.db.content().set_status(&id, status)? {
        return Err(ApiError::not_found(format!("content {id} not found")));
    }
    Ok(ok(json!({ "id": id, "status": status.as_str() })))
}

/// `POST /api/content/cleanup`. Manual cleanup trigger.
pub async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let max_age_days = body
        .and_then(|Json(b)| b.max_age_days)
        .unwrap_or(state.settings.content_max_age_days);
    let repo = state.db.content();
    let removed = repo.cleanup(max_age_days)?;
    let expired = repo.expire_due()?;
    Ok(ok(json!({ "removed": removed, "expired": expired })))
}

/// `GET /api/content/stats/overview`
pub async fn stats_overview(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.db.content().stats()?;
    Ok(ok(json!({
        "total": stats.total,
        "byType": stats.by_type.iter().map(|(category, count)| {
            json!({ "type": category, "count": count })
        }).collect::<Vec<_>>(),
        "bySource": stats.by_source.iter().map(|(source, count)| {
            json!({ "source": source, "count": count })
        }).collect::<Vec<_>>(),
    })))
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(Some("a,b , c".to_string())),
            vec!["a", "b", "c"]
        );
        assert!(split_list(None).is_empty());
    }
}
