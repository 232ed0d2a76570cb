use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::domain::EventRecord;
use crate::error::Error;
use crate::hits::{next_hit_state, BounceCandidacy, HitState, ValidatorToken};
use crate::store::AnalyticsStore;
use crate::ua::parse_user_agent;
use crate::visit::{classify, DayBoundary, VisitClassification};

/// Upper bound on the store write made while the client waits.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Query parameters of a tracking request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectParams {
    pub site_id: String,
    pub host: String,
    pub path: String,
    pub referrer: String,
    /// Hit count reported by a client that asked `/cache` first.
    pub hits: Option<u32>,
}

impl CollectParams {
    /// Unknown keys are ignored; missing ones become empty strings.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let text = |key: &str| {
            query
                .get(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            site_id: text("sid"),
            host: text("h"),
            path: text("p"),
            referrer: text("r"),
            hits: query
                .get("ht")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|h| *h >= 1),
        }
    }
}

/// Outcome of the validator exchange for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub classification: VisitClassification,
    pub hit_state: HitState,
}

pub fn exchange(
    now: DateTime<Utc>,
    prior: Option<&ValidatorToken>,
    boundary: &DayBoundary,
) -> Visit {
    Visit {
        classification: classify(now, prior.map(ValidatorToken::issued_at), boundary),
        hit_state: next_hit_state(now, prior, boundary),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingSite,
    MissingPath,
    Robot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Record(EventRecord),
    Skip(SkipReason),
}

/// Request facts that come from headers rather than query parameters.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: String,
    pub country: String,
}

/// Decide what, if anything, a tracking request writes.
pub fn build_event(
    params: &CollectParams,
    visit: &Visit,
    client: &ClientInfo,
    ignore_robots: bool,
) -> Disposition {
    if params.site_id.is_empty() {
        return Disposition::Skip(SkipReason::MissingSite);
    }
    if params.path.is_empty() {
        return Disposition::Skip(SkipReason::MissingPath);
    }

    let ua = parse_user_agent(&client.user_agent);
    if ua.is_bot && ignore_robots {
        return Disposition::Skip(SkipReason::Robot);
    }

    let hits = params.hits.unwrap_or(visit.hit_state.hits);

    Disposition::Record(EventRecord {
        site_id: params.site_id.clone(),
        host: params.host.clone(),
        path: params.path.clone(),
        referrer: params.referrer.clone(),
        country: client.country.clone(),
        user_agent: client.user_agent.clone(),
        browser_name: ua.browser_name,
        browser_version: ua.browser_version,
        device_model: ua.device_model,
        device_type: ua.device_type,
        new_visitor: visit.classification.new_visitor_flag(),
        new_session: visit.classification.new_session_flag(),
        bounce: BounceCandidacy::from_hits(hits).as_f64(),
    })
}

/// Write one event, waiting at most `WRITE_TIMEOUT`. Failures are logged and
/// swallowed; returns whether the write went through.
pub async fn write_event(store: &dyn AnalyticsStore, event: &EventRecord) -> bool {
    let point = event.to_data_point();
    match tokio::time::timeout(WRITE_TIMEOUT, store.write(point)).await {
        Ok(Ok(())) => {
            debug!("Recorded view of {} for site {}", event.path, event.site_id);
            true
        }
        Ok(Err(e)) => {
            match e {
                Error::StoreTimeout => warn!("Analytics store timed out for site {}", event.site_id),
                e => error!("Failed to write event for site {}: {}", event.site_id, e),
            }
            false
        }
        Err(_) => {
            warn!(
                "Write for site {} exceeded {:?}, dropped",
                event.site_id, WRITE_TIMEOUT
            );
            false
        }
    }
}
