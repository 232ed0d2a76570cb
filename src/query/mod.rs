mod engine;
mod filters;
mod interval;

pub use engine::{bounce_rate, QueryEngine, PAGE_SIZE, SITES_LIMIT};
pub use filters::{Filters, QueryRequest, TimeWindow, DEFAULT_INTERVAL, DEFAULT_TIMEZONE};
pub use interval::{
    local_midnight, parse_timezone, truncate_local, DateRange, Interval, MAX_INTERVAL_DAYS,
};
