use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCommand {
    Init {
        site_id: String,
        reporter_url: String,
    },
    TrackPageview {
        url: String,
        referrer: Option<String>,
    },
    ClearCache,
}

/// A request the embedding page should send to the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
    pub url: Url,
    pub if_modified_since: Option<String>,
}

#[derive(Debug, Clone)]
struct TrackerConfig {
    site_id: String,
    reporter: Url,
}

#[derive(Debug, Clone, Default)]
pub struct Tracker {
    config: Option<TrackerConfig>,
    validator: Option<String>,
    // Hit count from the last `/cache` answer, sent once as `ht`.
    pending_hits: Option<u32>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// The token that will be echoed on the next pageview.
    pub fn validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }

    pub fn dispatch(&mut self, command: TrackerCommand) -> Result<Option<CollectRequest>> {
        match command {
            TrackerCommand::Init {
                site_id,
                reporter_url,
            } => {
                let reporter = Url::parse(reporter_url.trim())?;
                debug!("Tracker initialized for site {}", site_id);
                self.config = Some(TrackerConfig { site_id, reporter });
                Ok(None)
            }
            TrackerCommand::TrackPageview { url, referrer } => {
                let config = self.config.as_ref().ok_or(Error::TrackerNotInitialized)?;
                let page = Url::parse(url.trim())?;
                let host = page.host_str().unwrap_or_default();
                let referrer = referrer
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty() && !same_host(r, host))
                    .unwrap_or_default();

                let mut collect = config.reporter.clone();
                {
                    let mut pairs = collect.query_pairs_mut();
                    pairs
                        .append_pair("sid", &config.site_id)
                        .append_pair("h", host)
                        .append_pair("p", page.path())
                        .append_pair("r", referrer);
                    if let Some(hits) = self.pending_hits.take() {
                        pairs.append_pair("ht", &hits.to_string());
                    }
                }

                Ok(Some(CollectRequest {
                    url: collect,
                    if_modified_since: self.validator.clone(),
                }))
            }
            TrackerCommand::ClearCache => {
                self.validator = None;
                self.pending_hits = None;
                Ok(None)
            }
        }
    }

    /// A `/cache` request next to the reporter URL, carrying the current
    /// validator. Its answer tells the page how many hits the session has.
    pub fn cache_request(&self) -> Result<CollectRequest> {
        let config = self.config.as_ref().ok_or(Error::TrackerNotInitialized)?;
        Ok(CollectRequest {
            url: config.reporter.join("cache")?,
            if_modified_since: self.validator.clone(),
        })
    }

    /// Remember the collector's `Last-Modified` value, as a browser cache would.
    pub fn record_response(&mut self, last_modified: Option<&str>) {
        if let Some(value) = last_modified.map(str::trim).filter(|v| !v.is_empty()) {
            self.validator = Some(value.to_string());
        }
    }

    /// Record a `/cache` answer. The reported hit count rides along as `ht`
    /// on the next pageview.
    pub fn record_cache_response(&mut self, last_modified: Option<&str>, hits: u32) {
        self.record_response(last_modified);
        self.pending_hits = Some(hits);
    }
}

fn same_host(referrer: &str, host: &str) -> bool {
    Url::parse(referrer)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
        .unwrap_or(false)
}
