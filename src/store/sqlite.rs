use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row, ValueRef};
use tracing::{debug, warn};

use super::{AnalyticsStore, DataPoint, SqlDialect, STORE_TIMESTAMP_FORMAT};
use crate::columns::{BLOB_SLOTS, DOUBLE_SLOTS, SAMPLE_INTERVAL, TIMESTAMP};
use crate::error::Result;

/// Local analytics store on SQLite. One table per dataset, laid out like the
/// hosted engine's: a timestamp, a sample interval, one index and fixed
/// positional blob and double columns.
pub struct SqliteStore {
    pool: SqlitePool,
    dataset: String,
}

impl SqliteStore {
    pub async fn connect(url: &str, dataset: &str) -> Result<Self> {
        // Each in-memory connection is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 10 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self {
            pool,
            dataset: dataset.to_string(),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store, used by tests and benchmarks.
    pub async fn in_memory(dataset: &str) -> Result<Self> {
        Self::connect("sqlite::memory:", dataset).await
    }

    pub async fn migrate(&self) -> Result<()> {
        let ddl = create_table_sql(&self.dataset);
        sqlx::raw_sql(&ddl).execute(&self.pool).await?;
        debug!("Dataset table {} ready", self.dataset);
        Ok(())
    }

    /// Write a point with an explicit timestamp. Seeding and tests use this to
    /// place events in the past.
    pub async fn insert_at(&self, point: &DataPoint, timestamp: DateTime<Utc>) -> Result<()> {
        if point.blobs.len() > BLOB_SLOTS as usize || point.doubles.len() > DOUBLE_SLOTS as usize {
            warn!(
                "Data point for {} has {} blobs and {} doubles, extra values dropped",
                point.index,
                point.blobs.len(),
                point.doubles.len()
            );
        }

        let sql = insert_sql(&self.dataset);
        let mut query = sqlx::query(&sql)
            .bind(timestamp.format(STORE_TIMESTAMP_FORMAT).to_string())
            .bind(&point.index);

        for i in 0..BLOB_SLOTS as usize {
            query = query.bind(point.blobs.get(i).cloned().unwrap_or_default());
        }
        for i in 0..DOUBLE_SLOTS as usize {
            query = query.bind(point.doubles.get(i).copied().unwrap_or(0.0));
        }

        query.execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn dataset(&self) -> &str {
        &self.dataset
    }

    async fn write(&self, point: DataPoint) -> Result<()> {
        self.insert_at(&point, Utc::now()).await
    }

    async fn query(&self, sql: &str) -> Result<Vec<Value>> {
        debug!("SQL: {}", sql);
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn create_table_sql(dataset: &str) -> String {
    let mut columns = vec![
        format!("{TIMESTAMP} TEXT NOT NULL"),
        format!("{SAMPLE_INTERVAL} INTEGER NOT NULL DEFAULT 1"),
        "index1 TEXT NOT NULL DEFAULT ''".to_string(),
    ];
    columns.extend((1..=BLOB_SLOTS).map(|n| format!("blob{n} TEXT NOT NULL DEFAULT ''")));
    columns.extend((1..=DOUBLE_SLOTS).map(|n| format!("double{n} REAL NOT NULL DEFAULT 0")));

    format!(
        "CREATE TABLE IF NOT EXISTS {dataset} (\n    {}\n);\n\
         CREATE INDEX IF NOT EXISTS idx_{dataset}_site_time ON {dataset} (blob8, {TIMESTAMP});",
        columns.join(",\n    ")
    )
}

fn insert_sql(dataset: &str) -> String {
    let mut names = vec![TIMESTAMP.to_string(), "index1".to_string()];
    names.extend((1..=BLOB_SLOTS).map(|n| format!("blob{n}")));
    names.extend((1..=DOUBLE_SLOTS).map(|n| format!("double{n}")));
    let placeholders = vec!["?"; names.len()].join(", ");

    format!(
        "INSERT INTO {dataset} ({}) VALUES ({placeholders})",
        names.join(", ")
    )
}

fn row_to_json(row: &SqliteRow) -> Value {
    let mut object = Map::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let is_null = row.try_get_raw(idx).map(|raw| raw.is_null()).unwrap_or(true);
        let value = if is_null {
            Value::Null
        } else if let Ok(n) = row.try_get::<i64, _>(idx) {
            Value::from(n)
        } else if let Ok(f) = row.try_get::<f64, _>(idx) {
            Value::from(f)
        } else if let Ok(s) = row.try_get::<String, _>(idx) {
            Value::from(s)
        } else {
            Value::Null
        };
        object.insert(column.name().to_string(), value);
    }
    Value::Object(object)
}
