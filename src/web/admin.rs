//! Admin cache management endpoints.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode, db_error};
use crate::web::status::CacheStatsInfo;

/// Invalidation request. Omit everything for a full clear, give `endpoint`
/// for a per-endpoint clear, or `endpoint` + `params` for one exact entry.
#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    pub endpoint: Option<String>,
    pub params: Option<BTreeMap<String, String>>,
}

pub(super) async fn clear_cache(
    State(state): State<AppState>,
    body: Option<Json<ClearCacheRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if request.endpoint.is_none() && request.params.is_some() {
        return Err(ApiError::new(
            ApiErrorCode::InvalidParams,
            "params can only be given together with an endpoint",
        ));
    }

    let cleared = state
        .cached
        .invalidate(request.endpoint.as_deref(), request.params.as_ref())
        .await
        .map_err(|e| db_error("Cache clear", e))?;

    info!(cleared, endpoint = ?request.endpoint, "cache invalidated");
    Ok(Json(json!({"cleared": cleared})))
}

pub(super) async fn cache_stats(
    State(state): State<AppState>,
) -> Result<Json<CacheStatsInfo>, ApiError> {
    let stats = state
        .cached
        .cache_stats()
        .await
        .map_err(|e| db_error("Cache stats query", e))?;
    Ok(Json(stats.into()))
}
