//! Scraper control and run-log endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::super::error::ApiError;
use super::super::AppState;
use super::{ok, ok_paginated};
use crate::logging;
use crate::models::{RunStatus, Trigger};
use crate::repository::RunLogFilter;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    pub triggered_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub scraper_name: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLogQuery {
    pub max_lines: Option<usize>,
}

/// `GET /api/scraper/status`
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.scraper.status().await)
}

/// `GET /api/scraper/types`
pub async fn types(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.scraper.adapter_names())
}

/// `POST /api/scraper/start`. 202 on accept, 409 while running.
pub async fn start_all(
    State(state): State<AppState>,
    body: Option<Json<StartBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let (trigger, caller) = parse_trigger(body);
    state.scraper.clone().start_all(trigger, caller)?;
    Ok((
        StatusCode::ACCEPTED,
        ok(json!({ "message": "scrape run started" })),
    ))
}

/// `POST /api/scraper/start/{name}`. 404 unknown, 409 while running.
pub async fn start_one(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<StartBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let (trigger, caller) = parse_trigger(body);
    state.scraper.clone().start_one(&name, trigger, caller)?;
    Ok((
        StatusCode::ACCEPTED,
        ok(json!({ "message": format!("scrape run started for {name}") })),
    ))
}

/// `POST /api/scraper/stop`. Cooperative cancel.
pub async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    state.scraper.stop();
    ok(json!({ "message": "stop requested" }))
}

/// `GET /api/scraper/logs`
pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            RunStatus::from_str(raw)
                .ok_or_else(|| ApiError::bad_request(format!("invalid status: {raw}")))?,
        ),
        None => None,
    };
    let filter = RunLogFilter {
        adapter: query.scraper_name,
        source: query.source,
        status,
        start_date: query.start_date.as_deref().map(parse_date).transpose()?,
        end_date: query.end_date.as_deref().map(parse_date).transpose()?,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };
    let (runs, total) = state.db.run_logs().list(&filter)?;
    Ok(ok_paginated(runs, filter.page(), filter.limit(), total))
}

/// `GET /api/scraper/logs/{id}`
pub async fn log_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run = state
        .db
        .run_logs()
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(format!("run log {id} not found")))?;
    Ok(ok(run))
}

/// `GET /api/scraper/stats?days=7`
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let days = query.days.unwrap_or(7).clamp(1, 365);
    Ok(ok(state.db.run_logs().stats(days)?))
}

/// `GET /api/scraper/file-logs/{filename}`. Tail of one structured log.
pub async fn file_log(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<FileLogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !logging::is_valid_log_name(&filename) {
        return Err(ApiError::not_found("no such log file"));
    }
    let max_lines = query.max_lines.unwrap_or(500).clamp(1, 5_000);
    let lines = logging::tail(state.settings.log_dir.as_path(), &filename, max_lines)
        .map_err(|_| ApiError::not_found("no such log file"))?;
    Ok(ok(json!({ "filename": filename, "lines": lines })))
}

fn parse_trigger(body: Option<Json<StartBody>>) -> (Trigger, Option<String>) {
    let raw = body.and_then(|Json(b)| b.triggered_by);
    match raw {
        Some(value) => {
            let trigger = Trigger::from_str(&value).unwrap_or(Trigger::Api);
            (trigger, Some(value))
        }
        None => (Trigger::Api, None),
    }
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::bad_request(format!("invalid date: {raw}")))
}
