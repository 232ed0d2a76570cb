mod dialect;
mod remote;
mod sqlite;

pub use dialect::{SqlDialect, STORE_TIMESTAMP_FORMAT};
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    #[serde(rename = "indexes", serialize_with = "index_as_list")]
    pub index: String,
    pub blobs: Vec<String>,
    pub doubles: Vec<f64>,
}

fn index_as_list<S: Serializer>(index: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    [index].serialize(serializer)
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Name of the dataset (table) queries select from.
    fn dataset(&self) -> &str;

    /// Append one data point. The store assigns its timestamp.
    async fn write(&self, point: DataPoint) -> Result<()>;

    /// Run a read query and return its rows as JSON objects.
    async fn query(&self, sql: &str) -> Result<Vec<Value>>;
}

/// Run a read query and decode each row into `T`.
pub async fn query_as<T: DeserializeOwned>(store: &dyn AnalyticsStore, sql: &str) -> Result<Vec<T>> {
    let rows = store.query(sql).await?;
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| Error::Store(format!("unexpected row shape: {}", e)))
        })
        .collect()
}

/// Numbers may arrive as JSON numbers, floats from `SUM` over doubles, or
/// quoted 64-bit integers. Missing values count as zero.
pub fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .unwrap_or(0),
        _ => 0,
    })
}

pub fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

pub fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => parse_store_timestamp(&s),
        _ => None,
    })
}

/// Parse a timestamp as the store renders it (`2024-01-18 09:33:02`).
pub fn parse_store_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, STORE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}
