//! Event ingestion and reporting routes

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use cached::proc_macro::cached;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::{middleware, AppState};
use crate::db::reports::{RankStat, SummaryStats, RANK_CATEGORIES};
use crate::db::{
    clamp_pagination, day_start_millis, parse_date, Database, Event, EventQuery, NewEvent,
    MILLIS_PER_DAY,
};
use crate::enrich::ip::anonymize_ip;
use crate::enrich::ua::parse_user_agent;
use crate::error::AppError;

/// The shape a beacon or an authenticated event POST carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeaconPayload {
    #[serde(default)]
    pub site_id: i64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    /// Explicit client IP; filled from the request when empty.
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub referrer: String,
    /// Explicit User-Agent; filled from the request header when empty.
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub screen: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_value: String,
}

/// Standard paged response envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Enrich a raw beacon into a storable event: fill IP/User-Agent from the
/// request, anonymize the IP, and attach geo + user-agent fields. Every
/// enrichment degrades to defaults instead of failing the beacon.
fn build_event(
    state: &AppState,
    payload: BeaconPayload,
    headers: &HeaderMap,
    socket_ip: &str,
) -> NewEvent {
    let raw_ip = if payload.ip.is_empty() {
        middleware::client_ip(headers, socket_ip)
    } else {
        payload.ip
    };

    // Geo is resolved from the full IP; only the masked form is stored
    let geo = state.geoip.lookup(&raw_ip);
    let ip = match anonymize_ip(&raw_ip) {
        Ok(masked) => masked,
        Err(e) => {
            tracing::warn!("could not anonymize ip {:?}: {}", raw_ip, e);
            raw_ip
        }
    };

    let user_agent = if payload.user_agent.is_empty() {
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    } else {
        payload.user_agent
    };
    let ua = parse_user_agent(&user_agent);

    NewEvent {
        site_id: payload.site_id,
        session_id: payload.session_id,
        user_id: payload.user_id,
        ip,
        url: payload.url,
        referrer: payload.referrer,
        user_agent,
        device: ua.device,
        browser: ua.browser,
        os: ua.os,
        screen: payload.screen,
        is_bot: ua.is_bot,
        country: geo.country,
        subdivision: geo.subdivision,
        city: geo.city,
        isp: geo.isp,
        event_type: payload.event_type,
        event_value: payload.event_value,
    }
}

/// POST /api/events - authenticated event creation
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<BeaconPayload>,
) -> Result<Json<Event>, AppError> {
    middleware::authorize_site(&state, &headers, payload.site_id).await?;

    let new = build_event(&state, payload, &headers, &addr.ip().to_string());
    let event = state.db.ingest_event(&new).await?;
    Ok(Json(event))
}

/// POST /send - public beacon endpoint used by the tracking script. The
/// site must exist before anything is ingested.
pub async fn track_beacon(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<BeaconPayload>,
) -> Result<Json<Event>, AppError> {
    state
        .db
        .get_site(payload.site_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let new = build_event(&state, payload, &headers, &addr.ip().to_string());
    let event = state.db.ingest_event(&new).await?;
    Ok(Json(event))
}

/// GET /api/events/:site_id - filtered, paginated event list
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    headers: HeaderMap,
    Query(query): Query<EventQuery>,
) -> Result<Json<Page<Event>>, AppError> {
    middleware::authorize_site(&state, &headers, site_id).await?;

    let (page, page_size) = query.page_bounds();
    let (list, total) = state.db.list_events(site_id, &query).await?;
    Ok(Json(Page {
        list,
        total,
        page,
        page_size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Resolve an inclusive date-range request, defaulting to today (UTC).
fn resolve_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(String, String, i64, i64), AppError> {
    let today = Utc::now().date_naive();
    let start = match start {
        Some(raw) => parse_date(raw)
            .ok_or_else(|| AppError::Validation(format!("invalid start_date: {raw}")))?,
        None => today,
    };
    let end = match end {
        Some(raw) => parse_date(raw)
            .ok_or_else(|| AppError::Validation(format!("invalid end_date: {raw}")))?,
        None => today,
    };

    let start_ms = day_start_millis(start);
    let end_ms = day_start_millis(end) + MILLIS_PER_DAY;
    Ok((start.to_string(), end.to_string(), start_ms, end_ms))
}

/// Cached summary query - 60 second TTL per (site, range)
#[cached(
    time = 60,
    result = true,
    key = "String",
    convert = r#"{ format!("{}:{}:{}", site_id, start_ms, end_ms) }"#
)]
async fn get_cached_summary(
    db: Database,
    site_id: i64,
    start_date: String,
    end_date: String,
    start_ms: i64,
    end_ms: i64,
) -> Result<SummaryStats, sqlx::Error> {
    db.get_summary(site_id, &start_date, &end_date, start_ms, end_ms)
        .await
}

/// GET /api/events/:site_id/summary - traffic totals for a date range
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryStats>, AppError> {
    middleware::authorize_site(&state, &headers, site_id).await?;

    let (start_date, end_date, start_ms, end_ms) =
        resolve_date_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let stats = get_cached_summary(
        state.db.clone(),
        site_id,
        start_date,
        end_date,
        start_ms,
        end_ms,
    )
    .await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct RankQuery {
    #[serde(default = "default_rank_category")]
    pub category: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

fn default_rank_category() -> String {
    "url".to_string()
}

/// GET /api/events/:site_id/rank - top-N breakdown by dimension, served
/// from the daily rollups
pub async fn rank(
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<i64>,
    headers: HeaderMap,
    Query(query): Query<RankQuery>,
) -> Result<Json<Page<RankStat>>, AppError> {
    middleware::authorize_site(&state, &headers, site_id).await?;

    if !RANK_CATEGORIES.contains(&query.category.as_str()) {
        return Err(AppError::Validation(format!(
            "unknown category: {}",
            query.category
        )));
    }

    let (start_date, end_date, _, _) =
        resolve_date_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let (page, page_size) = clamp_pagination(query.page, query.page_size, 10);

    let (list, total) = state
        .db
        .get_rank(site_id, &query.category, &start_date, &end_date, page, page_size)
        .await?;
    Ok(Json(Page {
        list,
        total,
        page,
        page_size,
    }))
}
