//! Domain types for the upstream football API: match statuses, the phase
//! decision table shared by every TTL computation, and the compact fixture
//! summary stored in the team-fixtures cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Short status codes reported by the upstream API for a fixture.
///
/// The set is closed: codes the API may add later parse as [`MatchStatus::Unknown`]
/// and classify conservatively as scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// `TBD` — scheduled, kickoff time not yet confirmed.
    TimeToBeDefined,
    /// `NS` — not started.
    NotStarted,
    /// `1H` — first half in play.
    FirstHalf,
    /// `HT` — halftime break.
    HalfTime,
    /// `2H` — second half in play.
    SecondHalf,
    /// `ET` — extra time in play.
    ExtraTime,
    /// `BT` — break before extra time.
    BreakTime,
    /// `P` — penalty shootout in progress.
    PenaltyShootout,
    /// `SUSP` — suspended, expected to resume.
    Suspended,
    /// `INT` — interrupted, expected to resume.
    Interrupted,
    /// `LIVE` — in play, phase unreported.
    InPlay,
    /// `FT` — finished after regular time.
    FullTime,
    /// `AET` — finished after extra time.
    AfterExtraTime,
    /// `PEN` — finished on penalties.
    PenaltyResult,
    /// `PST` — postponed.
    Postponed,
    /// `CANC` — cancelled.
    Cancelled,
    /// `ABD` — abandoned.
    Abandoned,
    /// `AWD` — technical win awarded.
    Awarded,
    /// `WO` — walkover.
    Walkover,
    /// Any code this build does not recognize.
    Unknown,
}

/// Coarse lifecycle phase of a fixture, the single decision table behind
/// every adaptive TTL computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// In play or paused mid-match; state changes by the minute.
    Live,
    /// Final result, never changes again.
    Finished,
    /// Postponed, cancelled or abandoned; may be rescheduled out-of-band.
    Disrupted,
    /// Not yet kicked off.
    Scheduled,
}

impl MatchStatus {
    /// Parse an upstream short status code.
    pub fn from_short(code: &str) -> Self {
        match code {
            "TBD" => Self::TimeToBeDefined,
            "NS" => Self::NotStarted,
            "1H" => Self::FirstHalf,
            "HT" => Self::HalfTime,
            "2H" => Self::SecondHalf,
            "ET" => Self::ExtraTime,
            "BT" => Self::BreakTime,
            "P" => Self::PenaltyShootout,
            "SUSP" => Self::Suspended,
            "INT" => Self::Interrupted,
            "LIVE" => Self::InPlay,
            "FT" => Self::FullTime,
            "AET" => Self::AfterExtraTime,
            "PEN" => Self::PenaltyResult,
            "PST" => Self::Postponed,
            "CANC" => Self::Cancelled,
            "ABD" => Self::Abandoned,
            "AWD" => Self::Awarded,
            "WO" => Self::Walkover,
            _ => Self::Unknown,
        }
    }

    pub fn phase(self) -> MatchPhase {
        match self {
            Self::FirstHalf
            | Self::HalfTime
            | Self::SecondHalf
            | Self::ExtraTime
            | Self::BreakTime
            | Self::PenaltyShootout
            | Self::Suspended
            | Self::Interrupted
            | Self::InPlay => MatchPhase::Live,
            Self::FullTime
            | Self::AfterExtraTime
            | Self::PenaltyResult
            | Self::Awarded
            | Self::Walkover => MatchPhase::Finished,
            Self::Postponed | Self::Cancelled | Self::Abandoned => MatchPhase::Disrupted,
            Self::TimeToBeDefined | Self::NotStarted | Self::Unknown => MatchPhase::Scheduled,
        }
    }
}

/// Status and kickoff metadata extracted from one fixture record of an
/// otherwise opaque payload. All the TTL policy ever looks at.
#[derive(Debug, Clone, Copy)]
pub struct FixtureMeta {
    pub status: MatchStatus,
    pub kickoff: Option<DateTime<Utc>>,
}

/// Pull `(status, kickoff)` out of every fixture record in an upstream
/// envelope. Records missing the status block are skipped; a missing or
/// unparseable kickoff date is tolerated.
///
/// Non-fixture payloads (standings, teams, ...) simply yield no records.
pub fn fixture_records(payload: &Value) -> Vec<FixtureMeta> {
    let Some(items) = payload.get("response").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let fixture = item.get("fixture")?;
            let short = fixture.get("status")?.get("short")?.as_str()?;
            let kickoff = fixture
                .get("date")
                .and_then(Value::as_str)
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.to_utc());
            Some(FixtureMeta {
                status: MatchStatus::from_short(short),
                kickoff,
            })
        })
        .collect()
}

/// A single match outcome in a team's recent history, stored as JSONB in the
/// team-fixtures cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSummary {
    pub fixture_id: i64,
    pub kickoff: DateTime<Utc>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    /// Raw upstream short status code; classify via [`MatchStatus::from_short`].
    pub status: String,
}

impl FixtureSummary {
    /// Build a summary from one record of an upstream `fixtures` response.
    /// Returns `None` for records missing any of the identifying fields.
    pub fn from_response_item(item: &Value) -> Option<Self> {
        let fixture = item.get("fixture")?;
        let teams = item.get("teams")?;
        let goals = item.get("goals")?;

        let kickoff = fixture
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())?
            .to_utc();

        Some(Self {
            fixture_id: fixture.get("id")?.as_i64()?,
            kickoff,
            home_team_id: teams.get("home")?.get("id")?.as_i64()?,
            away_team_id: teams.get("away")?.get("id")?.as_i64()?,
            home_goals: goals.get("home").and_then(Value::as_i64),
            away_goals: goals.get("away").and_then(Value::as_i64),
            status: fixture.get("status")?.get("short")?.as_str()?.to_owned(),
        })
    }

    /// `W`/`D`/`L` from the perspective of `team_id`, or `None` when the
    /// match is not finished or the team did not play in it.
    pub fn outcome_for(&self, team_id: i64) -> Option<char> {
        if MatchStatus::from_short(&self.status).phase() != MatchPhase::Finished {
            return None;
        }
        let (home, away) = (self.home_goals?, self.away_goals?);
        let (own, opponent) = if team_id == self.home_team_id {
            (home, away)
        } else if team_id == self.away_team_id {
            (away, home)
        } else {
            return None;
        };
        Some(match own.cmp(&opponent) {
            std::cmp::Ordering::Greater => 'W',
            std::cmp::Ordering::Equal => 'D',
            std::cmp::Ordering::Less => 'L',
        })
    }
}

/// Derive a form string (most recent first, e.g. `"WWDLL"`) from a team's
/// fixture history. Unfinished fixtures are skipped; at most `len` outcomes.
pub fn form_string(fixtures: &[FixtureSummary], team_id: i64, len: usize) -> String {
    let mut recent: Vec<&FixtureSummary> = fixtures.iter().collect();
    recent.sort_by(|a, b| b.kickoff.cmp(&a.kickoff));
    recent
        .iter()
        .filter_map(|f| f.outcome_for(team_id))
        .take(len)
        .collect()
}
