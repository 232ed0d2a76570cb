use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Inactivity window after which a new session starts.
pub const SESSION_WINDOW_SECS: i64 = 30 * 60;

pub fn session_window() -> Duration {
    Duration::seconds(SESSION_WINDOW_SECS)
}

/// Calendar used to decide whether two instants fall on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary(Tz);

impl DayBoundary {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    pub fn utc() -> Self {
        Self(Tz::UTC)
    }

    pub fn timezone(&self) -> Tz {
        self.0
    }

    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.0.from_utc_datetime(&a.naive_utc()).date_naive()
            == self.0.from_utc_datetime(&b.naive_utc()).date_naive()
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

/// True while `prior` is less than the session window before `now`.
///
/// A prior instant slightly ahead of `now` (the hit counter may push a token
/// up to 59 seconds forward) still counts as inside the window.
pub fn within_session(now: DateTime<Utc>, prior: DateTime<Utc>) -> bool {
    now - prior < session_window()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitClassification {
    pub new_visitor: bool,
    pub new_session: bool,
}

impl VisitClassification {
    pub fn new_visitor_flag(&self) -> f64 {
        if self.new_visitor {
            1.0
        } else {
            0.0
        }
    }

    pub fn new_session_flag(&self) -> f64 {
        if self.new_session {
            1.0
        } else {
            0.0
        }
    }
}

/// Classify a request. The day check and the session check are independent:
/// a session can continue across midnight while the visitor counts as new.
pub fn classify(
    now: DateTime<Utc>,
    prior: Option<DateTime<Utc>>,
    boundary: &DayBoundary,
) -> VisitClassification {
    match prior {
        None => VisitClassification {
            new_visitor: true,
            new_session: true,
        },
        Some(prior) => VisitClassification {
            new_visitor: !boundary.same_day(now, prior),
            new_session: !within_session(now, prior),
        },
    }
}
