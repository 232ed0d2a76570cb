use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::geo::GeoIpLookup;
use crate::query::QueryEngine;
use crate::store::AnalyticsStore;
use crate::visit::DayBoundary;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalyticsStore>,
    pub engine: QueryEngine,
    pub settings: Arc<Settings>,
    pub geo: Arc<GeoIpLookup>,
    pub day_boundary: DayBoundary,
    clock: fn() -> DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn AnalyticsStore>, settings: Settings, geo: GeoIpLookup) -> Result<Self> {
        let day_boundary = DayBoundary::new(settings.day_boundary()?);
        Ok(Self {
            engine: QueryEngine::new(store.clone()),
            store,
            settings: Arc::new(settings),
            geo: Arc::new(geo),
            day_boundary,
            clock: Utc::now,
        })
    }

    /// Replace the wall clock, e.g. to pin "now" in tests.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
