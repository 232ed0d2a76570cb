use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::filters::Filters;
use super::interval::{local_midnight, truncate_local, DateRange};
use crate::columns::{Column, SAMPLE_INTERVAL, TIMESTAMP};
use crate::domain::{
    BounceRate, Breakdown, CountedItem, Counts, EarliestEvents, Granularity, SiteHits, Stats,
    TimeBucket,
};
use crate::error::{Error, Result};
use crate::store::{
    lenient_i64, lenient_string, lenient_timestamp, query_as, AnalyticsStore, SqlDialect,
};

pub const PAGE_SIZE: u32 = 10;
pub const SITES_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct CountsRow {
    #[serde(default, deserialize_with = "lenient_i64")]
    views: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    visitors: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    bounces: i64,
}

impl From<CountsRow> for Counts {
    fn from(row: CountsRow) -> Self {
        Counts {
            views: row.views,
            visitors: row.visitors,
            bounces: row.bounces.max(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountedRow {
    #[serde(default, deserialize_with = "lenient_string")]
    value: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    views: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    visitors: i64,
}

#[derive(Debug, Deserialize)]
struct QuarterRow {
    #[serde(default, deserialize_with = "lenient_i64")]
    bucket: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    views: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    visitors: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    bounces: i64,
}

#[derive(Debug, Deserialize)]
struct EarliestRow {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    earliest: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_i64")]
    bounce: i64,
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    #[serde(default, deserialize_with = "lenient_string")]
    site: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    views: i64,
}

/// Translates typed queries into store SQL and folds the rows back into
/// typed aggregates.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn AnalyticsStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    fn dialect(&self) -> SqlDialect {
        self.store.dialect()
    }

    fn dataset(&self) -> &str {
        self.store.dataset()
    }

    fn time_condition(&self, range: &DateRange) -> String {
        let dialect = self.dialect();
        format!(
            "{TIMESTAMP} >= {} AND {TIMESTAMP} < {}",
            dialect.timestamp(range.start),
            dialect.timestamp(range.end)
        )
    }

    fn where_clause(&self, site_id: &str, range: Option<&DateRange>, filters: &Filters) -> String {
        let dialect = self.dialect();
        let mut conditions = vec![format!(
            "{} = {}",
            Column::SiteId.physical(),
            dialect.quote(site_id)
        )];
        if let Some(range) = range {
            conditions.push(self.time_condition(range));
        }
        for (column, value) in filters.iter() {
            conditions.push(format!("{} = {}", column.physical(), dialect.quote(value)));
        }
        conditions.join(" AND ")
    }

    fn counts_select() -> String {
        format!(
            "SUM({si}) AS views, SUM({si} * {nv}) AS visitors, SUM({si} * {b}) AS bounces",
            si = SAMPLE_INTERVAL,
            nv = Column::NewVisitor.physical(),
            b = Column::Bounce.physical()
        )
    }

    pub async fn get_counts(
        &self,
        site_id: &str,
        range: &DateRange,
        filters: &Filters,
    ) -> Result<Counts> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            Self::counts_select(),
            self.dataset(),
            self.where_clause(site_id, Some(range), filters)
        );
        let rows: Vec<CountsRow> = query_as(self.store.as_ref(), &sql).await?;
        Ok(rows.into_iter().next().map(Counts::from).unwrap_or_default())
    }

    /// One page of views and visitors grouped by `column`, busiest first.
    pub async fn get_count_by(
        &self,
        site_id: &str,
        column: Column,
        range: &DateRange,
        filters: &Filters,
        page: u32,
    ) -> Result<Breakdown> {
        if !column.is_groupable() {
            return Err(Error::InvalidColumn(column.to_string()));
        }
        if page == 0 {
            return Err(Error::InvalidPage(page.to_string()));
        }

        let physical = column.physical();
        let sql = format!(
            "SELECT {physical} AS value, SUM({si}) AS views, SUM({si} * {nv}) AS visitors \
             FROM {ds} WHERE {cond} GROUP BY {physical} ORDER BY views DESC, value ASC LIMIT {limit}",
            si = SAMPLE_INTERVAL,
            nv = Column::NewVisitor.physical(),
            ds = self.dataset(),
            cond = self.where_clause(site_id, Some(range), filters),
            limit = u64::from(page) * u64::from(PAGE_SIZE),
        );
        let rows: Vec<CountedRow> = query_as(self.store.as_ref(), &sql).await?;

        let skip = u64::from(page.saturating_sub(1)) * u64::from(PAGE_SIZE);
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let rows: Vec<CountedItem> = rows
            .into_iter()
            .skip(skip)
            .map(|row| CountedItem {
                value: row.value,
                views: row.views,
                visitors: row.visitors,
            })
            .collect();

        Ok(Breakdown {
            column,
            page,
            has_more: rows.len() == PAGE_SIZE as usize,
            rows,
        })
    }

    /// Contiguous buckets covering `range`, one per local hour or day in `tz`.
    ///
    /// The store aggregates by UTC quarter hour; every real UTC offset is a
    /// whole number of quarter hours, so each of those rows lands in exactly
    /// one local bucket.
    pub async fn get_views_grouped_by_interval(
        &self,
        site_id: &str,
        granularity: Granularity,
        range: &DateRange,
        tz: Tz,
        filters: &Filters,
    ) -> Result<Vec<TimeBucket>> {
        let sql = format!(
            "SELECT {bucket} AS bucket, {counts} FROM {ds} WHERE {cond} GROUP BY bucket ORDER BY bucket",
            bucket = self.dialect().quarter_hour_bucket(TIMESTAMP),
            counts = Self::counts_select(),
            ds = self.dataset(),
            cond = self.where_clause(site_id, Some(range), filters),
        );
        let rows: Vec<QuarterRow> = query_as(self.store.as_ref(), &sql).await?;

        let mut buckets: BTreeMap<NaiveDateTime, Counts> = bucket_keys(range, granularity, tz)
            .into_iter()
            .map(|key| (key, Counts::default()))
            .collect();

        for row in rows {
            let Some(instant) = DateTime::<Utc>::from_timestamp(row.bucket, 0) else {
                debug!("Skipping unparseable bucket {}", row.bucket);
                continue;
            };
            let key = truncate_local(instant.with_timezone(&tz).naive_local(), granularity);
            match buckets.get_mut(&key) {
                Some(counts) => {
                    counts.views += row.views;
                    counts.visitors += row.visitors;
                    counts.bounces += row.bounces;
                }
                None => debug!("Row at {} falls outside the requested buckets", instant),
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket, mut counts)| {
                counts.bounces = counts.bounces.max(0);
                TimeBucket { bucket, counts }
            })
            .collect())
    }

    /// Earliest event and earliest bounce candidate ever recorded for a site.
    pub async fn get_earliest_events(&self, site_id: &str) -> Result<EarliestEvents> {
        let bounce = Column::Bounce.physical();
        let sql = format!(
            "SELECT MIN({TIMESTAMP}) AS earliest, {bounce} AS bounce FROM {ds} WHERE {cond} GROUP BY {bounce}",
            ds = self.dataset(),
            cond = self.where_clause(site_id, None, &Filters::new()),
        );
        let rows: Vec<EarliestRow> = query_as(self.store.as_ref(), &sql).await?;

        let earliest_event = rows.iter().filter_map(|r| r.earliest).min();
        let earliest_bounce = rows
            .iter()
            .filter(|r| r.bounce != 0)
            .filter_map(|r| r.earliest)
            .min();

        Ok(EarliestEvents {
            earliest_event,
            earliest_bounce,
        })
    }

    pub async fn get_stats(
        &self,
        site_id: &str,
        range: &DateRange,
        filters: &Filters,
    ) -> Result<Stats> {
        let (counts, earliest) = tokio::try_join!(
            self.get_counts(site_id, range, filters),
            self.get_earliest_events(site_id)
        )?;

        Ok(Stats {
            counts,
            bounce_rate: bounce_rate(&counts, &earliest, range.start),
            earliest,
        })
    }

    /// Sites with traffic in `range`, busiest first.
    pub async fn get_sites_by_hits(&self, range: &DateRange) -> Result<Vec<SiteHits>> {
        let site = Column::SiteId.physical();
        let sql = format!(
            "SELECT {site} AS site, SUM({SAMPLE_INTERVAL}) AS views FROM {ds} WHERE {cond} \
             GROUP BY {site} ORDER BY views DESC, site ASC LIMIT {SITES_LIMIT}",
            ds = self.dataset(),
            cond = self.time_condition(range),
        );
        let rows: Vec<SiteRow> = query_as(self.store.as_ref(), &sql).await?;
        Ok(rows
            .into_iter()
            .map(|row| SiteHits {
                site_id: row.site,
                views: row.views,
            })
            .collect())
    }
}

/// Bounce rate for `counts`, or `InsufficientData` unless bounce candidates
/// were already being recorded before the range started.
pub fn bounce_rate(
    counts: &Counts,
    earliest: &EarliestEvents,
    range_start: DateTime<Utc>,
) -> BounceRate {
    match earliest.earliest_bounce {
        Some(first) if first < range_start => {
            let value = if counts.visitors > 0 {
                counts.bounces as f64 / counts.visitors as f64
            } else {
                0.0
            };
            BounceRate::Available { value }
        }
        _ => BounceRate::InsufficientData,
    }
}

/// Local bucket starts whose first instant falls inside `range`. Local hours
/// skipped by a DST gap have no bucket.
fn bucket_keys(range: &DateRange, granularity: Granularity, tz: Tz) -> Vec<NaiveDateTime> {
    let step = match granularity {
        Granularity::Hour => Duration::hours(1),
        Granularity::Day => Duration::days(1),
    };

    let mut keys = Vec::new();
    let mut key = truncate_local(range.start.with_timezone(&tz).naive_local(), granularity);
    loop {
        let first_instant = match granularity {
            Granularity::Day => Some(local_midnight(key.date(), tz)),
            Granularity::Hour => tz
                .from_local_datetime(&key)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        };
        match first_instant {
            Some(instant) if instant >= range.end => break,
            Some(_) => keys.push(key),
            None => {}
        }
        key += step;
    }
    keys
}
