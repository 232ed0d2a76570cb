use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::domain::Granularity;
use crate::error::{Error, Result};

/// Longest `Nd` window a query may ask for.
pub const MAX_INTERVAL_DAYS: u32 = 366;

/// Half-open UTC range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange);
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Today,
    Yesterday,
    Days(u32),
}

fn days_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)d$").ok()).as_ref()
}

impl Interval {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "today" => return Ok(Self::Today),
            "yesterday" => return Ok(Self::Yesterday),
            _ => {}
        }

        let days = days_pattern()
            .and_then(|re| re.captures(s))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|n| (1..=MAX_INTERVAL_DAYS).contains(n))
            .ok_or_else(|| Error::InvalidInterval(s.to_string()))?;
        Ok(Self::Days(days))
    }

    /// One-day windows are bucketed by hour, everything longer by day.
    pub fn granularity(&self) -> Granularity {
        match self {
            Self::Today | Self::Yesterday | Self::Days(1) => Granularity::Hour,
            Self::Days(_) => Granularity::Day,
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>, tz: Tz) -> Result<DateRange> {
        let today = now.with_timezone(&tz).date_naive();
        match self {
            Self::Today => DateRange::new(local_midnight(today, tz), now),
            Self::Yesterday => {
                let yesterday = today
                    .pred_opt()
                    .ok_or_else(|| Error::InvalidInterval(self.to_string()))?;
                DateRange::new(local_midnight(yesterday, tz), local_midnight(today, tz))
            }
            // The last 24 local hours, starting on an hour boundary.
            Self::Days(1) => {
                let earlier = now - Duration::hours(23);
                let hour =
                    truncate_local(earlier.with_timezone(&tz).naive_local(), Granularity::Hour);
                let start = tz
                    .from_local_datetime(&hour)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(earlier);
                DateRange::new(start, now)
            }
            // Today plus the N-1 local days before it.
            Self::Days(n) => {
                let first_day = today
                    .checked_sub_days(chrono::Days::new(u64::from(n.saturating_sub(1))))
                    .ok_or_else(|| Error::InvalidInterval(self.to_string()))?;
                DateRange::new(local_midnight(first_day, tz), now)
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Yesterday => write!(f, "yesterday"),
            Self::Days(n) => write!(f, "{}d", n),
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::InvalidTimezone(name.to_string()))
}

/// First instant of `date` in `tz`. Where a DST gap swallows midnight the day
/// starts at the first local time that exists.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=4 * 24)
        .map(|quarter| midnight + Duration::minutes(15 * quarter))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Start of the local hour or day containing `local`.
pub fn truncate_local(local: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let day = local.date().and_time(NaiveTime::MIN);
    match granularity {
        Granularity::Day => day,
        Granularity::Hour => day + Duration::hours(i64::from(local.hour())),
    }
}
