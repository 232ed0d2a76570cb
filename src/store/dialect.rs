use chrono::{DateTime, Utc};

/// Timestamp rendering shared by both dialects.
pub const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds per quarter hour. Every real UTC offset is a multiple of it, so
/// quarter-hour rows can be folded into local hours and days exactly.
pub const QUARTER_HOUR_SECS: i64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// The local SQLite-backed store.
    Sqlite,
    /// ClickHouse-flavoured SQL spoken by the hosted analytics engine.
    ClickHouse,
}

impl SqlDialect {
    /// Render a string literal.
    pub fn quote(&self, value: &str) -> String {
        match self {
            Self::Sqlite => format!("'{}'", value.replace('\'', "''")),
            Self::ClickHouse => format!(
                "'{}'",
                value.replace('\\', "\\\\").replace('\'', "\\'")
            ),
        }
    }

    /// Render an instant comparable with the `timestamp` column.
    pub fn timestamp(&self, instant: DateTime<Utc>) -> String {
        let text = instant.format(STORE_TIMESTAMP_FORMAT).to_string();
        match self {
            Self::Sqlite => format!("'{}'", text),
            Self::ClickHouse => format!("toDateTime('{}')", text),
        }
    }

    /// Expression yielding the unix start of the row's UTC quarter hour.
    pub fn quarter_hour_bucket(&self, column: &str) -> String {
        match self {
            Self::Sqlite => format!(
                "(CAST(strftime('%s', {column}) AS INTEGER) / {q}) * {q}",
                q = QUARTER_HOUR_SECS
            ),
            Self::ClickHouse => format!(
                "toUnixTimestamp(toStartOfInterval({column}, INTERVAL '15' MINUTE))"
            ),
        }
    }
}
