//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;
use ts_rs::TS;

use crate::cache::dedup::DedupStats;
use crate::cache::store::CacheStats;
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CacheStatsInfo {
    pub total: i64,
    pub valid: i64,
    pub expired: i64,
    pub total_hits: i64,
}

impl From<CacheStats> for CacheStatsInfo {
    fn from(stats: CacheStats) -> Self {
        Self {
            total: stats.total,
            valid: stats.valid,
            expired: stats.expired,
            total_hits: stats.total_hits,
        }
    }
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CoalescerInfo {
    pub pending_count: usize,
    pub oldest_age_ms: u64,
}

impl From<DedupStats> for CoalescerInfo {
    fn from(stats: DedupStats) -> Self {
        Self {
            pending_count: stats.pending_count,
            oldest_age_ms: stats.oldest_age_ms,
        }
    }
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub commit: String,
    pub cache: CacheStatsInfo,
    pub coalescer: CoalescerInfo,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Service status: build info plus cache and coalescer counters.
pub(super) async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let cache_stats = state
        .cached
        .cache_stats()
        .await
        .map_err(|e| db_error("Cache stats query", e))?;

    Ok(Json(StatusResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        commit: env!("GIT_COMMIT_SHORT").to_owned(),
        cache: cache_stats.into(),
        coalescer: state.cached.dedup_stats().into(),
    }))
}
