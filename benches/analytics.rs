//! Criterion benchmarks for the quietcount hot paths
//!
//! Run with: cargo bench
//!
//! Query benchmarks run against an in-memory store seeded with a fixed,
//! deterministic month of traffic, so no external database is required.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

use quietcount::{
    collector::{build_event, exchange, ClientInfo, CollectParams, Disposition},
    columns::Column,
    hits::{encode_hit_token, next_hit_state, ValidatorToken},
    query::{DateRange, Filters, Interval, QueryEngine},
    store::SqliteStore,
    visit::DayBoundary,
};

const SITE: &str = "bench";
const BROWSERS: &[&str] = &["Chrome", "Firefox", "Safari", "Edge"];
const PAGES: &[&str] = &["/", "/about", "/pricing", "/blog", "/docs", "/signup"];
const COUNTRIES: &[&str] = &["US", "GB", "DE", "FR", "CA", "JP"];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
}

async fn seeded_engine(events: usize) -> QueryEngine {
    let store = SqliteStore::in_memory("metricsDataset").await.unwrap();
    let boundary = DayBoundary::utc();
    let start = now() - Duration::days(30);

    for i in 0..events {
        let at = start + Duration::minutes((i as i64 * 37) % (30 * 24 * 60));
        let params = CollectParams {
            site_id: SITE.to_string(),
            host: "bench.example.com".to_string(),
            path: PAGES[i % PAGES.len()].to_string(),
            referrer: String::new(),
            hits: Some((i % 4) as u32 + 1),
        };
        let visit = exchange(at, None, &boundary);
        let client = ClientInfo {
            user_agent: "Mozilla/5.0".to_string(),
            country: COUNTRIES[i % COUNTRIES.len()].to_string(),
        };
        if let Disposition::Record(mut event) = build_event(&params, &visit, &client, false) {
            event.browser_name = BROWSERS[i % BROWSERS.len()].to_string();
            store.insert_at(&event.to_data_point(), at).await.unwrap();
        }
    }

    QueryEngine::new(Arc::new(store))
}

fn bench_hit_counter(c: &mut Criterion) {
    let boundary = DayBoundary::utc();
    let at = now();
    let prior = encode_hit_token(at - Duration::minutes(3), 4);
    let header = prior.to_header();

    let mut group = c.benchmark_group("hit_counter");

    group.bench_function("parse_validator", |b| {
        b.iter(|| black_box(ValidatorToken::from_header(black_box(&header))))
    });

    group.bench_function("next_hit_state", |b| {
        b.iter(|| black_box(next_hit_state(black_box(at), Some(&prior), &boundary)))
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = rt.block_on(seeded_engine(20_000));

    let month = Interval::Days(30).resolve(now(), Tz::UTC).unwrap();
    let week = Interval::Days(7).resolve(now(), Tz::UTC).unwrap();
    let day = DateRange::new(now() - Duration::days(1), now()).unwrap();
    let none = Filters::new();
    let firefox = Filters::new().with(Column::BrowserName, "Firefox");

    let mut group = c.benchmark_group("queries");

    group.bench_function(BenchmarkId::new("stats", "30_days"), |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.get_stats(SITE, &month, &none).await.unwrap()) });
    });

    group.bench_function(BenchmarkId::new("stats", "30_days_filtered"), |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.get_stats(SITE, &month, &firefox).await.unwrap()) });
    });

    for column in [Column::Path, Column::BrowserName, Column::Country] {
        group.bench_function(BenchmarkId::new("breakdown", column.name()), |b| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    engine
                        .get_count_by(SITE, column, &month, &none, 1)
                        .await
                        .unwrap(),
                )
            });
        });
    }

    group.bench_function(BenchmarkId::new("timeseries", "7_days_utc"), |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                engine
                    .get_views_grouped_by_interval(
                        SITE,
                        Interval::Days(7).granularity(),
                        &week,
                        Tz::UTC,
                        &none,
                    )
                    .await
                    .unwrap(),
            )
        });
    });

    group.bench_function(BenchmarkId::new("timeseries", "24_hours_new_york"), |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                engine
                    .get_views_grouped_by_interval(
                        SITE,
                        Interval::Today.granularity(),
                        &day,
                        chrono_tz::America::New_York,
                        &none,
                    )
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hit_counter, bench_queries);
criterion_main!(benches);
