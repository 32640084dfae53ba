//! League standings endpoint.

use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;

use crate::cache::key::params_from;
use crate::cache::ttl::ttl_for_payload;
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode, upstream_error};
use crate::web::routes::{cache_control_for_ttl, with_cache_control};

#[derive(Debug, Deserialize)]
pub struct StandingsQuery {
    pub league: Option<String>,
    pub season: Option<String>,
}

pub(super) async fn standings(
    State(state): State<AppState>,
    Query(query): Query<StandingsQuery>,
) -> Result<Response, ApiError> {
    if query.league.is_none() || query.season.is_none() {
        return Err(ApiError::new(
            ApiErrorCode::InvalidParams,
            "Both league and season are required",
        ));
    }
    let params = params_from([("league", query.league), ("season", query.season)]);

    let payload = state
        .cached
        .fetch_cached("standings", &params, None)
        .await
        .map_err(|e| upstream_error("Standings fetch", e))?;

    let header = cache_control_for_ttl(ttl_for_payload("standings", &payload, Utc::now()));
    Ok(with_cache_control(&*payload, header))
}
