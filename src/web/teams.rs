//! Team form endpoint, backed by the stale-while-revalidate fixture history.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::football::models::form_string;
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode, upstream_error};
use crate::web::routes::{cache, with_cache_control};

/// Outcomes rendered in the form string.
const FORM_DISPLAY_LEN: usize = 5;

#[derive(Debug, Deserialize)]
pub struct FormQuery {
    pub league: Option<i32>,
    pub season: Option<i32>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamFormResponse {
    pub team_id: i32,
    pub league_id: i32,
    pub season: i32,
    /// Most recent first, e.g. `"WWDLL"`.
    pub form: String,
    /// Finished matches the form string was derived from.
    pub matches_considered: usize,
    pub last_kickoff: Option<DateTime<Utc>>,
}

pub(super) async fn team_form(
    State(state): State<AppState>,
    Path(team_id): Path<i32>,
    Query(query): Query<FormQuery>,
) -> Result<Response, ApiError> {
    let (Some(league_id), Some(season)) = (query.league, query.season) else {
        return Err(ApiError::new(
            ApiErrorCode::InvalidParams,
            "Both league and season are required",
        ));
    };

    let fixtures = state
        .team_form
        .recent_fixtures(team_id, league_id, season)
        .await
        .map_err(|e| upstream_error("Team form fetch", e))?;

    let form = form_string(&fixtures, i64::from(team_id), FORM_DISPLAY_LEN);
    let response = TeamFormResponse {
        team_id,
        league_id,
        season,
        matches_considered: form.len(),
        form,
        last_kickoff: fixtures.iter().map(|f| f.kickoff).max(),
    };

    Ok(with_cache_control(response, cache::STANDARD))
}
