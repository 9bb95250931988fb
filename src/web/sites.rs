//! Site management routes

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::routes::Page;
use super::{middleware, AppState};
use crate::db::{clamp_pagination, Site};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct SiteCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct SiteListQuery {
    pub name: Option<String>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

/// POST /api/sites - create a site and mint its API key (admin)
pub async fn create_site(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SiteCreate>,
) -> Result<Json<Site>, AppError> {
    middleware::authorize_admin(&state, &headers)?;

    if payload.name.is_empty() || payload.domain.is_empty() {
        return Err(AppError::Validation(
            "site name and domain are required".to_string(),
        ));
    }

    let site = state.db.create_site(&payload.name, &payload.domain).await?;
    tracing::info!("site {} created for {}", site.id, site.domain);
    Ok(Json(site))
}

/// GET /api/sites - paginated site list (admin)
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SiteListQuery>,
) -> Result<Json<Page<Site>>, AppError> {
    middleware::authorize_admin(&state, &headers)?;

    let (page, page_size) = clamp_pagination(query.page, query.page_size, 20);
    let (list, total) = state
        .db
        .list_sites(page, page_size, query.name.as_deref())
        .await?;
    Ok(Json(Page {
        list,
        total,
        page,
        page_size,
    }))
}

/// GET /api/sites/:id - site details (owner or admin)
pub async fn get_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Site>, AppError> {
    let site = middleware::authorize_site(&state, &headers, id).await?;
    Ok(Json(site))
}

/// DELETE /api/sites/:id - remove a site and everything it owns (admin)
pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    middleware::authorize_admin(&state, &headers)?;
    state.db.get_site(id).await?.ok_or(AppError::NotFound)?;

    state.db.delete_site(id).await?;
    tracing::info!("site {} deleted", id);
    Ok(Json(json!({ "deleted": id })))
}

/// DELETE /api/sites/:id/stats - clear a site's events, sessions and
/// rollups, keeping the site itself (owner or admin)
pub async fn clear_site_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    middleware::authorize_site(&state, &headers, id).await?;

    state.db.clear_site_stats(id).await?;
    tracing::info!("stats cleared for site {}", id);
    Ok(Json(json!({ "cleared": id })))
}
