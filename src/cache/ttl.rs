//! Adaptive TTL policy.
//!
//! Fixture payloads are classified by the lifecycle phase of the records they
//! contain: a live match invalidates in a minute, a finished one is stable
//! for a day. Non-fixture endpoints get fixed TTLs by kind. An explicit
//! caller TTL always wins, and an explicit TTL of 0 means the persistent
//! store is bypassed entirely (handled by the fetch path, not here).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::football::models::{FixtureMeta, MatchPhase, fixture_records};

/// Any record in play.
pub const TTL_LIVE: i64 = 60;
/// Every record has its final result.
pub const TTL_FINISHED: i64 = 86_400;
/// Postponed / cancelled / abandoned; reschedules arrive out-of-band.
pub const TTL_DISRUPTED: i64 = 21_600;
/// Kickoff within two hours; lineups and status changes are imminent.
pub const TTL_IMMINENT: i64 = 300;
/// Standard upcoming fixtures and anything unclassifiable.
pub const TTL_DEFAULT: i64 = 3_600;
/// League standings.
pub const TTL_STANDINGS: i64 = 21_600;
/// Teams, players, venues, leagues — static reference data.
pub const TTL_REFERENCE: i64 = 604_800;

/// Kickoffs closer than this count as imminent.
const IMMINENT_WINDOW_MINUTES: i64 = 120;

/// Coarse upstream endpoint families with distinct volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Fixtures,
    Standings,
    Reference,
    Other,
}

impl EndpointKind {
    /// Classify an endpoint path (e.g. `fixtures`, `fixtures/headtohead`,
    /// `standings`, `teams`).
    pub fn classify(endpoint: &str) -> Self {
        let family = endpoint
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        match family {
            "fixtures" => Self::Fixtures,
            "standings" => Self::Standings,
            "teams" | "players" | "leagues" | "countries" | "venues" | "coachs" => Self::Reference,
            _ => Self::Other,
        }
    }
}

/// Compute the TTL for a set of fixture records. First match wins:
/// live → finished → disrupted → imminent kickoff → default.
pub fn compute_ttl(kind: EndpointKind, records: &[FixtureMeta], now: DateTime<Utc>) -> i64 {
    match kind {
        EndpointKind::Standings => TTL_STANDINGS,
        EndpointKind::Reference => TTL_REFERENCE,
        EndpointKind::Other => TTL_DEFAULT,
        EndpointKind::Fixtures => {
            if records.is_empty() {
                return TTL_DEFAULT;
            }
            let phases: Vec<MatchPhase> = records.iter().map(|r| r.status.phase()).collect();

            if phases.iter().any(|p| *p == MatchPhase::Live) {
                return TTL_LIVE;
            }
            if phases.iter().all(|p| *p == MatchPhase::Finished) {
                return TTL_FINISHED;
            }
            if phases.iter().any(|p| *p == MatchPhase::Disrupted) {
                return TTL_DISRUPTED;
            }
            let imminent_cutoff = now + Duration::minutes(IMMINENT_WINDOW_MINUTES);
            let imminent = records.iter().any(|r| {
                r.status.phase() == MatchPhase::Scheduled
                    && r.kickoff.is_some_and(|k| k > now && k <= imminent_cutoff)
            });
            if imminent {
                return TTL_IMMINENT;
            }
            TTL_DEFAULT
        }
    }
}

/// Classify an opaque upstream payload for its endpoint. This is the single
/// entry point used both when storing a response and when deriving
/// `Cache-Control` headers for it, so the two can never disagree.
pub fn ttl_for_payload(endpoint: &str, payload: &Value, now: DateTime<Utc>) -> i64 {
    compute_ttl(EndpointKind::classify(endpoint), &fixture_records(payload), now)
}
