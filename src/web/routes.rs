//! Web API router construction and shared response utilities.

use std::time::Duration;

use axum::{
    Router,
    http::HeaderValue,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::cache::ttl::{TTL_DEFAULT, TTL_IMMINENT, TTL_LIVE, TTL_STANDINGS};
use crate::state::AppState;
use crate::web::{admin, fixtures, standings, status, teams};

/// Cache-Control presets, one per TTL class the adaptive policy produces.
///
/// The edge respects `s-maxage` for shared caching and
/// `stale-while-revalidate` for serving stale content while re-fetching.
pub mod cache {
    /// Live fixtures — short edge cache only.
    pub const LIVE: &str = "public, max-age=30, s-maxage=60, stale-while-revalidate=30";
    /// Kickoff imminent.
    pub const IMMINENT: &str = "public, max-age=120, s-maxage=300, stale-while-revalidate=120";
    /// Standard upcoming fixtures.
    pub const STANDARD: &str = "public, max-age=300, s-maxage=3600, stale-while-revalidate=300";
    /// Standings, disrupted fixtures.
    pub const STABLE: &str = "public, max-age=3600, s-maxage=21600, stale-while-revalidate=3600";
    /// Finished fixtures, reference data.
    pub const SETTLED: &str = "public, max-age=21600, s-maxage=86400, stale-while-revalidate=21600";
    /// Cache-bypassing and admin endpoints -- never cache.
    pub const NO_STORE: &str = "private, no-store, must-revalidate";
}

/// Map a computed TTL to its `Cache-Control` preset. Driven by the same
/// classification the store uses, so headers and storage never disagree.
pub fn cache_control_for_ttl(ttl: i64) -> &'static str {
    if ttl <= 0 {
        cache::NO_STORE
    } else if ttl <= TTL_LIVE {
        cache::LIVE
    } else if ttl <= TTL_IMMINENT {
        cache::IMMINENT
    } else if ttl <= TTL_DEFAULT {
        cache::STANDARD
    } else if ttl <= TTL_STANDINGS {
        cache::STABLE
    } else {
        cache::SETTLED
    }
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/fixtures", get(fixtures::fixtures))
        .route("/standings", get(standings::standings))
        .route("/teams/{id}/form", get(teams::team_form))
        .route("/admin/cache/stats", get(admin::cache_stats))
        .route("/admin/cache/clear", post(admin::clear_cache))
        .with_state(app_state);

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ttl::{TTL_FINISHED, TTL_REFERENCE, ttl_for_payload};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn ttl_classes_map_to_distinct_presets() {
        assert_eq!(cache_control_for_ttl(TTL_LIVE), cache::LIVE);
        assert_eq!(cache_control_for_ttl(TTL_IMMINENT), cache::IMMINENT);
        assert_eq!(cache_control_for_ttl(TTL_DEFAULT), cache::STANDARD);
        assert_eq!(cache_control_for_ttl(TTL_STANDINGS), cache::STABLE);
        assert_eq!(cache_control_for_ttl(TTL_FINISHED), cache::SETTLED);
        assert_eq!(cache_control_for_ttl(TTL_REFERENCE), cache::SETTLED);
        assert_eq!(cache_control_for_ttl(0), cache::NO_STORE);
    }

    #[test]
    fn headers_agree_with_the_adaptive_policy() {
        let live = json!({"response": [{"fixture": {"status": {"short": "2H"}}}]});
        let ttl = ttl_for_payload("fixtures", &live, Utc::now());
        assert_eq!(cache_control_for_ttl(ttl), cache::LIVE);

        let finished = json!({"response": [{"fixture": {"status": {"short": "FT"}}}]});
        let ttl = ttl_for_payload("fixtures", &finished, Utc::now());
        assert_eq!(cache_control_for_ttl(ttl), cache::SETTLED);
    }
}
