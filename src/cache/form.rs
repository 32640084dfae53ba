//! Stale-while-revalidate cache for per-team recent fixture history.
//!
//! Feeds the "form" display (last results as a `WWDLL` string). Unlike the
//! endpoint cache, an expired entry here is still servable for a bounded
//! grace window: readers get the stored history immediately and a background
//! refresh is kicked off, deduplicated so concurrent stale readers trigger
//! it once. Past the grace window the entry is a full miss and the caller
//! waits for a fresh fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{debug, warn};

use crate::cache::dedup::{DEFAULT_DEDUP_WINDOW, DEFAULT_SWEEP_INTERVAL, Deduplicator};
use crate::cache::ttl::{EndpointKind, compute_ttl};
use crate::football::models::{FixtureMeta, FixtureSummary, MatchStatus};
use crate::football::{FootballApi, FootballApiError};

/// How long past expiry an entry may still be served (with a refresh due).
const GRACE_WINDOW_SECONDS: i64 = 2 * 60 * 60;

/// How many recent fixtures are fetched and cached per team.
const FIXTURE_HISTORY_LEN: usize = 10;

/// Freshness of a cached aggregate relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < expires_at` — serve as-is.
    Fresh,
    /// Within the grace window past expiry — serve, but a refresh is due.
    Stale,
    /// Beyond the grace window — too old to serve even provisionally.
    Expired,
}

pub fn evaluate_freshness(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Freshness {
    if now < expires_at {
        Freshness::Fresh
    } else if now < expires_at + Duration::seconds(GRACE_WINDOW_SECONDS) {
        Freshness::Stale
    } else {
        Freshness::Expired
    }
}

/// TTL for a fixture list, using the same classification as the endpoint
/// cache applied over the aggregate.
fn aggregate_ttl(fixtures: &[FixtureSummary], now: DateTime<Utc>) -> i64 {
    let records: Vec<FixtureMeta> = fixtures
        .iter()
        .map(|f| FixtureMeta {
            status: MatchStatus::from_short(&f.status),
            kickoff: Some(f.kickoff),
        })
        .collect();
    compute_ttl(EndpointKind::Fixtures, &records, now)
}

#[derive(sqlx::FromRow)]
struct CachedRow {
    fixtures: Value,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TeamFormCache {
    api: Arc<FootballApi>,
    pool: PgPool,
    dedup: Deduplicator<Arc<Vec<FixtureSummary>>, FootballApiError>,
}

impl TeamFormCache {
    pub fn new(api: Arc<FootballApi>, pool: PgPool) -> Self {
        let dedup = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        dedup.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);
        Self { api, pool, dedup }
    }

    /// A team's recent fixture history, from cache when possible.
    ///
    /// Stale-but-servable entries are returned immediately while a
    /// deduplicated background refresh runs; a full miss fetches inline.
    pub async fn recent_fixtures(
        &self,
        team_id: i32,
        league_id: i32,
        season: i32,
    ) -> Result<Arc<Vec<FixtureSummary>>, FootballApiError> {
        match self.read(team_id, league_id, season).await {
            Some((fixtures, false)) => Ok(Arc::new(fixtures)),
            Some((fixtures, true)) => {
                self.spawn_refresh(team_id, league_id, season);
                Ok(Arc::new(fixtures))
            }
            None => self.refresh(team_id, league_id, season).await,
        }
    }

    /// Read the stored history, returning `(fixtures, is_stale)`.
    ///
    /// Expired-beyond-grace entries, read errors and undecodable payloads
    /// all degrade to a miss.
    async fn read(
        &self,
        team_id: i32,
        league_id: i32,
        season: i32,
    ) -> Option<(Vec<FixtureSummary>, bool)> {
        let result = sqlx::query_as::<_, CachedRow>(
            r#"
            SELECT fixtures, expires_at
            FROM team_fixtures_cache
            WHERE team_id = $1 AND league_id = $2 AND season = $3
            "#,
        )
        .bind(team_id)
        .bind(league_id)
        .bind(season)
        .fetch_optional(&self.pool)
        .await;

        let row = match result {
            Ok(row) => row?,
            Err(e) => {
                warn!(team_id, error = %e, "team fixtures read failed, treating as miss");
                return None;
            }
        };

        let is_stale = match evaluate_freshness(row.expires_at, Utc::now()) {
            Freshness::Fresh => false,
            Freshness::Stale => true,
            Freshness::Expired => return None,
        };

        match serde_json::from_value::<Vec<FixtureSummary>>(row.fixtures) {
            Ok(fixtures) => Some((fixtures, is_stale)),
            Err(e) => {
                warn!(team_id, error = %e, "stored team fixtures undecodable, treating as miss");
                None
            }
        }
    }

    /// Fetch the history from the upstream and store it. Concurrent
    /// refreshes for the same aggregate key collapse into one.
    async fn refresh(
        &self,
        team_id: i32,
        league_id: i32,
        season: i32,
    ) -> Result<Arc<Vec<FixtureSummary>>, FootballApiError> {
        let key = format!("team-fixtures:{team_id}:{league_id}:{season}");
        let this = self.clone();
        self.dedup
            .dedupe(&key, move || async move {
                let mut params = BTreeMap::new();
                params.insert("team".to_owned(), team_id.to_string());
                params.insert("league".to_owned(), league_id.to_string());
                params.insert("season".to_owned(), season.to_string());
                params.insert("last".to_owned(), FIXTURE_HISTORY_LEN.to_string());

                let payload = this.api.get("fixtures", &params).await?;
                let fixtures: Vec<FixtureSummary> = payload
                    .get("response")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(FixtureSummary::from_response_item)
                            .collect()
                    })
                    .unwrap_or_default();

                this.put_detached(team_id, league_id, season, fixtures.clone());
                Ok(Arc::new(fixtures))
            })
            .await
    }

    fn spawn_refresh(&self, team_id: i32, league_id: i32, season: i32) {
        let this = self.clone();
        tokio::spawn(async move {
            debug!(team_id, league_id, season, "refreshing stale team fixtures");
            if let Err(e) = this.refresh(team_id, league_id, season).await {
                warn!(team_id, error = %e, "background team fixtures refresh failed");
            }
        });
    }

    /// Fire-and-forget upsert; failure is logged, never propagated.
    fn put_detached(&self, team_id: i32, league_id: i32, season: i32, fixtures: Vec<FixtureSummary>) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let now = Utc::now();
            let ttl_seconds = aggregate_ttl(&fixtures, now);
            let result = sqlx::query(
                r#"
                INSERT INTO team_fixtures_cache
                    (team_id, league_id, season, fixtures, ttl_seconds, cached_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (team_id, league_id, season)
                DO UPDATE SET fixtures = EXCLUDED.fixtures,
                              ttl_seconds = EXCLUDED.ttl_seconds,
                              cached_at = EXCLUDED.cached_at,
                              expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(team_id)
            .bind(league_id)
            .bind(season)
            .bind(Json(&fixtures))
            .bind(ttl_seconds)
            .bind(now)
            .bind(now + Duration::seconds(ttl_seconds))
            .execute(&pool)
            .await;

            match result {
                Ok(_) => debug!(team_id, league_id, season, ttl_seconds, "cached team fixtures"),
                Err(e) => warn!(team_id, error = %e, "team fixtures write failed"),
            }
        });
    }
}
