//! Load test data seeder and query benchmark for quietcount
//!
//! Seeding drives simulated visitors through the same tracker and collector
//! pipeline the server uses, with a synthetic clock, so the stored events
//! carry realistic visitor, session and bounce flags.
//!
//! # Usage
//!
//! ```bash
//! # Seed a persistent database (default: loadtest.db)
//! cargo run --release --bin loadtest -- seed
//!
//! # Seed with custom settings
//! cargo run --release --bin loadtest -- seed --db ./my-test.db --visitors 5000 --sites 3 --days 14
//!
//! # Time the query engine on an existing database
//! cargo run --release --bin loadtest -- bench --db ./loadtest.db
//!
//! # Then start the server with this database:
//! QUIETCOUNT__DATABASE_PATH=./loadtest.db cargo run --release
//! ```

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::prelude::*;
use rand_distr::Exp;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use quietcount::{
    collector::{build_event, exchange, ClientInfo, CollectParams, Disposition},
    columns::Column,
    hits::ValidatorToken,
    query::{DateRange, Filters, Interval, QueryEngine},
    store::{AnalyticsStore, SqliteStore},
    tracker::{Tracker, TrackerCommand},
    visit::DayBoundary,
};

type BoxResult<T> = Result<T, Box<dyn StdError>>;

const DATASET: &str = "metricsDataset";
const REPORTER_URL: &str = "http://localhost:8080/collect";

const SITE_NAMES: &[&str] = &[
    "main-website",
    "blog",
    "docs",
    "api-portal",
    "status-page",
    "changelog",
    "careers",
    "press-room",
];

const PAGES: &[&str] = &[
    "/",
    "/about",
    "/pricing",
    "/features",
    "/contact",
    "/blog",
    "/blog/getting-started",
    "/blog/release-notes",
    "/docs",
    "/docs/api",
    "/docs/quickstart",
    "/docs/faq",
    "/signup",
    "/login",
];

const REFERRERS: &[&str] = &[
    "",
    "",
    "",
    "",
    "https://duckduckgo.com/",
    "https://www.google.com/",
    "https://news.ycombinator.com/item?id=12345",
    "https://reddit.com/r/selfhosted",
    "https://github.com/",
    "https://lobste.rs/",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
];

const COUNTRIES: &[&str] = &[
    "US", "US", "US", "US", // US weighted higher
    "GB", "DE", "FR", "CA", "AU", "NL", "SE", "JP", "BR", "IN",
];

/// Pick a start time within the last `days_back` days, weighted toward recent.
fn random_recent_datetime(
    rng: &mut impl Rng,
    now: DateTime<Utc>,
    days_back: u32,
) -> BoxResult<DateTime<Utc>> {
    let max_ms = (days_back as i64) * 24 * 60 * 60 * 1000;
    let exp = Exp::new(3.0 / max_ms as f64).map_err(|e| format!("{:?}", e))?;
    let offset_ms = (exp.sample(rng) as i64).min(max_ms);
    Ok(now - Duration::milliseconds(offset_ms))
}

fn pick<'a>(rng: &mut impl Rng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

struct SeedPlan {
    sites: usize,
    visitors_per_site: usize,
    days_back: u32,
}

#[derive(Default)]
struct SeedTotals {
    written: u64,
    skipped: u64,
}

/// Replay one pageview through tracker, validator exchange and event builder.
async fn simulate_pageview(
    store: &SqliteStore,
    tracker: &mut Tracker,
    client: &ClientInfo,
    boundary: &DayBoundary,
    url: &str,
    referrer: Option<String>,
    at: DateTime<Utc>,
    totals: &mut SeedTotals,
) -> BoxResult<()> {
    let Some(request) = tracker.dispatch(TrackerCommand::TrackPageview {
        url: url.to_string(),
        referrer,
    })?
    else {
        return Ok(());
    };

    let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
    let params = CollectParams::from_query(&query);
    let prior = request
        .if_modified_since
        .as_deref()
        .and_then(ValidatorToken::from_header);
    let visit = exchange(at, prior.as_ref(), boundary);

    match build_event(&params, &visit, client, true) {
        Disposition::Record(event) => {
            store.insert_at(&event.to_data_point(), at).await?;
            totals.written += 1;
        }
        Disposition::Skip(_) => totals.skipped += 1,
    }

    tracker.record_response(Some(&visit.hit_state.token.to_header()));
    Ok(())
}

async fn seed_database(store: &SqliteStore, plan: &SeedPlan) -> BoxResult<Vec<String>> {
    let mut rng = rand::rng();
    let boundary = DayBoundary::new(Tz::UTC);
    let now = Utc::now();
    let start = Instant::now();
    let mut totals = SeedTotals::default();

    let sites: Vec<String> = (0..plan.sites)
        .map(|i| {
            SITE_NAMES
                .get(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("site-{}", i + 1))
        })
        .collect();

    println!("\nData plan:");
    println!("  Sites: {}", plan.sites);
    println!("  Visitors per site: {}", plan.visitors_per_site);
    println!("  Time range: last {} days", plan.days_back);
    println!();

    for site in &sites {
        let host = format!("{}.example.com", site);
        let site_start = Instant::now();

        for _ in 0..plan.visitors_per_site {
            let mut tracker = Tracker::new();
            tracker.dispatch(TrackerCommand::Init {
                site_id: site.clone(),
                reporter_url: REPORTER_URL.to_string(),
            })?;

            let client = ClientInfo {
                user_agent: pick(&mut rng, USER_AGENTS).to_string(),
                country: pick(&mut rng, COUNTRIES).to_string(),
            };

            // Visits replay oldest first so the tracker's token moves forward in time.
            let visits = rng.random_range(1..=4);
            let mut starts = (0..visits)
                .map(|_| random_recent_datetime(&mut rng, now, plan.days_back))
                .collect::<BoxResult<Vec<_>>>()?;
            starts.sort();

            for visit_start in starts {
                // Roughly half of all visits are single-page bounces.
                let pageviews = if rng.random_bool(0.5) {
                    1
                } else {
                    rng.random_range(2..=8)
                };
                let mut at = visit_start;
                let mut referrer = Some(pick(&mut rng, REFERRERS).to_string());

                for _ in 0..pageviews {
                    let url = format!("https://{}{}", host, pick(&mut rng, PAGES));
                    simulate_pageview(
                        store,
                        &mut tracker,
                        &client,
                        &boundary,
                        &url,
                        referrer.take(),
                        at,
                        &mut totals,
                    )
                    .await?;
                    at += Duration::seconds(rng.random_range(10..600));
                }
            }
        }

        println!("  Seeded {} in {:?}", site, site_start.elapsed());
    }

    let total_time = start.elapsed();
    println!("\n{}", "=".repeat(60));
    println!("Seeding complete!");
    println!("{}", "=".repeat(60));
    println!("  Total time: {:?}", total_time);
    println!("  Events written: {}", totals.written);
    println!("  Robot pageviews skipped: {}", totals.skipped);
    println!(
        "  Rate: {:.0} events/sec",
        totals.written as f64 / total_time.as_secs_f64()
    );

    Ok(sites)
}

struct Stats {
    name: String,
    times: Vec<f64>,
}

impl Stats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            times: Vec::new(),
        }
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.times.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    fn mean(&self) -> f64 {
        if self.times.is_empty() {
            return 0.0;
        }
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }

    fn percentile(&self, p: f64) -> f64 {
        let sorted = self.sorted();
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
        sorted[idx]
    }

    fn median(&self) -> f64 {
        self.percentile(0.5)
    }

    fn p95(&self) -> f64 {
        self.percentile(0.95)
    }

    fn max(&self) -> f64 {
        self.times.iter().copied().fold(0.0, f64::max)
    }
}

async fn time_query<F, Fut, T>(name: &str, iterations: usize, mut run: F) -> BoxResult<Stats>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = quietcount::error::Result<T>>,
{
    println!("{}...", name);
    let mut stats = Stats::new(name);
    for _ in 0..iterations {
        let start = Instant::now();
        run().await?;
        stats.times.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(stats)
}

async fn run_benchmarks(store: Arc<dyn AnalyticsStore>) -> BoxResult<()> {
    let engine = QueryEngine::new(store);
    let now = Utc::now();
    let month = Interval::Days(30).resolve(now, Tz::UTC)?;
    let week = Interval::Days(7).resolve(now, Tz::UTC)?;
    let today = Interval::Today.resolve(now, Tz::UTC)?;

    let sites = engine.get_sites_by_hits(&month).await?;
    let Some(top) = sites.first() else {
        eprintln!("No events found. Run seeding first.");
        return Ok(());
    };
    let site = top.site_id.clone();

    println!("\n{}", "=".repeat(70));
    println!("Running Benchmarks");
    println!("{}", "=".repeat(70));
    println!("Top site: {} ({} views in 30 days)", site, top.views);
    println!();

    let iterations = 50;
    let none = Filters::new();
    let desktop = Filters::new().with(Column::DeviceType, "desktop");
    let mut results = Vec::new();

    results.push(
        time_query("Stats (30d)", iterations, || {
            engine.get_stats(&site, &month, &none)
        })
        .await?,
    );
    results.push(
        time_query("Stats (30d, desktop)", iterations, || {
            engine.get_stats(&site, &month, &desktop)
        })
        .await?,
    );
    for column in [Column::Path, Column::BrowserName, Column::Country, Column::Referrer] {
        let name = format!("Breakdown by {} (30d)", column.name());
        results.push(
            time_query(&name, iterations, || {
                engine.get_count_by(&site, column, &month, &none, 1)
            })
            .await?,
        );
    }
    results.push(
        time_query("Daily series (7d)", iterations, || {
            engine.get_views_grouped_by_interval(
                &site,
                Interval::Days(7).granularity(),
                &week,
                Tz::UTC,
                &none,
            )
        })
        .await?,
    );
    results.push(
        time_query("Hourly series (today)", iterations, || {
            engine.get_views_grouped_by_interval(
                &site,
                Interval::Today.granularity(),
                &today,
                Tz::UTC,
                &none,
            )
        })
        .await?,
    );
    results.push(
        time_query("Sites by hits (30d)", iterations, || {
            engine.get_sites_by_hits(&month)
        })
        .await?,
    );

    println!("\n{}", "-".repeat(80));
    println!(
        "{:<32} {:>10} {:>10} {:>10} {:>10}",
        "Query", "Mean", "Median", "P95", "Max"
    );
    println!("{}", "-".repeat(80));
    for r in &results {
        println!(
            "{:<32} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms",
            r.name,
            r.mean(),
            r.median(),
            r.p95(),
            r.max()
        );
    }
    println!("{}", "-".repeat(80));

    let total_mean: f64 = results.iter().map(Stats::mean).sum();
    println!("\nTotal dashboard load (sum of means): {:.2}ms", total_mean);

    if let Some(slowest) = results.iter().max_by(|a, b| a.mean().total_cmp(&b.mean())) {
        println!(
            "Slowest query: {} ({:.2}ms)",
            slowest.name,
            slowest.mean()
        );
    }

    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"
Usage: loadtest <command> [options]

Commands:
  seed     Seed the database with simulated traffic
  bench    Time the query engine on an existing database

Options for 'seed':
  --db <path>       Database path (default: loadtest.db)
  --visitors <n>    Visitors PER SITE (default: 2000)
  --sites <n>       Number of sites (default: 3)
  --days <n>        Days of history to generate (default: 7)
  --bench           Run benchmarks after seeding

Options for 'bench':
  --db <path>       Database path (default: loadtest.db)

After seeding, start the server with:
  QUIETCOUNT__DATABASE_PATH=./loadtest.db cargo run --release
"#
    );
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> BoxResult<T> {
    args.get(i)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| format!("Invalid value for {}", flag).into())
}

#[tokio::main]
async fn main() -> BoxResult<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];
    let mut db_path = PathBuf::from("loadtest.db");
    let mut plan = SeedPlan {
        sites: 3,
        visitors_per_site: 2_000,
        days_back: 7,
    };
    let mut run_bench = false;

    // Parse arguments
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                i += 1;
                db_path = parse_value(&args, i, "--db")?;
            }
            "--visitors" => {
                i += 1;
                plan.visitors_per_site = parse_value(&args, i, "--visitors")?;
            }
            "--sites" => {
                i += 1;
                plan.sites = parse_value(&args, i, "--sites")?;
            }
            "--days" => {
                i += 1;
                plan.days_back = parse_value::<u32>(&args, i, "--days")?.max(1);
            }
            "--bench" => {
                run_bench = true;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    match command.as_str() {
        "seed" => {
            println!("{}", "=".repeat(60));
            println!("quietcount load test - data seeder");
            println!("{}", "=".repeat(60));
            println!("Database: {}", db_path.display());

            let store = Arc::new(SqliteStore::connect(&db_url, DATASET).await?);
            let sites = seed_database(&store, &plan).await?;

            if let Some(site) = sites.first() {
                println!("\nTry:");
                println!("  curl 'http://localhost:8080/api/stats?site={}&interval=7d'", site);
            }
            println!("\nStart the server with:");
            println!(
                "  QUIETCOUNT__DATABASE_PATH={} cargo run --release",
                db_path.display()
            );

            if run_bench {
                run_benchmarks(store).await?;
            }
        }
        "bench" => {
            if !db_path.exists() {
                eprintln!("Database not found: {}", db_path.display());
                eprintln!("Run seeding first: cargo run --release --bin loadtest -- seed");
                std::process::exit(1);
            }

            let store = Arc::new(SqliteStore::connect(&db_url, DATASET).await?);
            run_benchmarks(store).await?;
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
