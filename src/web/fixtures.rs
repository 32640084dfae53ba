//! Fixtures endpoint: filtered pass-through to the upstream `fixtures`
//! resource via the caching fetch path.

use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;

use crate::cache::key::params_from;
use crate::cache::ttl::ttl_for_payload;
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode, upstream_error};
use crate::web::routes::{cache, cache_control_for_ttl, with_cache_control};

/// Accepted upstream filters. Anything else in the query string is ignored
/// rather than forwarded, keeping the cache key space bounded.
#[derive(Debug, Deserialize)]
pub struct FixturesQuery {
    pub id: Option<String>,
    pub live: Option<String>,
    pub date: Option<String>,
    pub league: Option<String>,
    pub season: Option<String>,
    pub team: Option<String>,
    pub last: Option<String>,
    pub next: Option<String>,
    pub round: Option<String>,
}

pub(super) async fn fixtures(
    State(state): State<AppState>,
    Query(query): Query<FixturesQuery>,
) -> Result<Response, ApiError> {
    let params = params_from([
        ("id", query.id),
        ("live", query.live),
        ("date", query.date),
        ("league", query.league),
        ("season", query.season),
        ("team", query.team),
        ("last", query.last),
        ("next", query.next),
        ("round", query.round),
    ]);

    if params.is_empty() {
        return Err(ApiError::new(
            ApiErrorCode::InvalidParams,
            "At least one fixtures filter is required (id, live, date, league, team, ...)",
        ));
    }

    // Live queries change by the second; bypass the persistent store.
    let live = params.contains_key("live");
    let ttl_override = live.then_some(0);

    let payload = state
        .cached
        .fetch_cached("fixtures", &params, ttl_override)
        .await
        .map_err(|e| upstream_error("Fixtures fetch", e))?;

    let header = if live {
        cache::LIVE
    } else {
        cache_control_for_ttl(ttl_for_payload("fixtures", &payload, Utc::now()))
    };
    Ok(with_cache_control(&*payload, header))
}
