use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::fmt;

use crate::visit::{within_session, DayBoundary};

/// Largest hit count the seconds field can carry. Counts saturate here.
pub const MAX_ENCODED_HITS: u32 = 59;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Validator echoed between `Last-Modified` and `If-Modified-Since`. The date
/// marks the session's last activity; the seconds field is its hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorToken(DateTime<Utc>);

impl ValidatorToken {
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Parse an `If-Modified-Since` value. Accepts IMF-fixdate and asctime.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(value, ASCTIME_FORMAT)
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }

    pub fn to_header(&self) -> String {
        self.0.format(HTTP_DATE_FORMAT).to_string()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for ValidatorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header())
    }
}

/// Build the token for `now` carrying `hits` (clamped to `1..=59`).
pub fn encode_hit_token(now: DateTime<Utc>, hits: u32) -> ValidatorToken {
    let seconds = hits.clamp(1, MAX_ENCODED_HITS);
    let encoded = now
        .with_nanosecond(0)
        .and_then(|t| t.with_second(seconds))
        .unwrap_or(now);
    ValidatorToken(encoded)
}

/// Hits recorded in a token. Any token stands for at least one earlier hit.
pub fn decode_hit_token(token: &ValidatorToken) -> u32 {
    token.0.second().max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitState {
    pub hits: u32,
    pub token: ValidatorToken,
}

/// Advance the hit counter for a request arriving at `now`.
///
/// The counter restarts when there is no prior token, when the calendar day
/// changed, or when the session window elapsed.
pub fn next_hit_state(
    now: DateTime<Utc>,
    prior: Option<&ValidatorToken>,
    boundary: &DayBoundary,
) -> HitState {
    let hits = match prior {
        Some(token)
            if boundary.same_day(now, token.issued_at())
                && within_session(now, token.issued_at()) =>
        {
            (decode_hit_token(token) + 1).min(MAX_ENCODED_HITS)
        }
        _ => 1,
    };

    HitState {
        hits,
        token: encode_hit_token(now, hits),
    }
}

/// Per-event contribution to the bounce count.
///
/// The first hit of a session counts as a bounce and the second hit takes it
/// back, so summing the column over any set of events yields the number of
/// single-hit sessions among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceCandidacy {
    Bounce,
    Unbounce,
    Neutral,
}

impl BounceCandidacy {
    pub fn from_hits(hits: u32) -> Self {
        match hits {
            0 | 1 => Self::Bounce,
            2 => Self::Unbounce,
            _ => Self::Neutral,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Bounce => 1.0,
            Self::Unbounce => -1.0,
            Self::Neutral => 0.0,
        }
    }
}
