use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};

use super::interval::{parse_timezone, Interval};
use crate::columns::Column;
use crate::error::{Error, Result};

pub const DEFAULT_INTERVAL: &str = "7d";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Exact-match filters, AND-conjoined. Only allow-listed columns get in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<Column, String>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the column cannot be filtered on.
    pub fn insert(&mut self, column: Column, value: impl Into<String>) -> bool {
        if !column.is_filterable() {
            return false;
        }
        self.0.insert(column, value.into());
        true
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// Pick filters out of query parameters keyed by logical column name.
    /// Unknown keys and empty values are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let mut filters = Self::new();
        for (key, value) in params {
            if value.is_empty() {
                continue;
            }
            if let Some(column) = Column::from_name(key) {
                filters.insert(column, value.clone());
            }
        }
        filters
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, &str)> {
        self.0.iter().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Interval and timezone of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub interval: Interval,
    pub timezone: Tz,
}

impl TimeWindow {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let interval = Interval::parse(
            params
                .get("interval")
                .map(String::as_str)
                .unwrap_or(DEFAULT_INTERVAL),
        )?;
        let timezone = parse_timezone(
            params
                .get("timezone")
                .map(String::as_str)
                .unwrap_or(DEFAULT_TIMEZONE),
        )?;
        Ok(Self { interval, timezone })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub site_id: String,
    pub window: TimeWindow,
    pub filters: Filters,
    pub page: u32,
}

impl QueryRequest {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let site_id = params
            .get("site")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingParameter("site"))?
            .to_string();

        let window = TimeWindow::from_params(params)?;

        let page = match params.get("page") {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| Error::InvalidPage(raw.clone()))?,
        };

        Ok(Self {
            site_id,
            window,
            filters: Filters::from_params(params),
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filters_are_allow_listed() {
        let filters = Filters::from_params(&params(&[
            ("path", "/blog"),
            ("country", "CA"),
            ("siteId", "other-site"),
            ("bounce", "1"),
            ("utm_source", "x"),
            ("site", "example"),
        ]));
        let got: Vec<(Column, &str)> = filters.iter().collect();
        assert_eq!(got, vec![(Column::Path, "/blog"), (Column::Country, "CA")]);
    }

    #[test]
    fn test_filters_skip_empty_values() {
        let filters = Filters::from_params(&params(&[("path", ""), ("host", "a.com")]));
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_insert_refuses_unfilterable_column() {
        let mut filters = Filters::new();
        assert!(!filters.insert(Column::SiteId, "x"));
        assert!(filters.insert(Column::BrowserName, "Firefox"));
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_query_request_defaults() {
        let req = QueryRequest::from_params(&params(&[("site", "example")])).unwrap();
        assert_eq!(req.site_id, "example");
        assert_eq!(req.window.interval, Interval::Days(7));
        assert_eq!(req.window.timezone, Tz::UTC);
        assert_eq!(req.page, 1);
        assert!(req.filters.is_empty());
    }

    #[test]
    fn test_query_request_requires_site() {
        assert!(matches!(
            QueryRequest::from_params(&params(&[("interval", "today")])),
            Err(Error::MissingParameter("site"))
        ));
        assert!(matches!(
            QueryRequest::from_params(&params(&[("site", "  ")])),
            Err(Error::MissingParameter("site"))
        ));
    }

    #[test]
    fn test_query_request_validation_errors() {
        assert!(matches!(
            QueryRequest::from_params(&params(&[("site", "a"), ("interval", "soon")])),
            Err(Error::InvalidInterval(_))
        ));
        assert!(matches!(
            QueryRequest::from_params(&params(&[("site", "a"), ("timezone", "Nowhere/City")])),
            Err(Error::InvalidTimezone(_))
        ));
        assert!(matches!(
            QueryRequest::from_params(&params(&[("site", "a"), ("page", "0")])),
            Err(Error::InvalidPage(_))
        ));
        assert!(matches!(
            QueryRequest::from_params(&params(&[("site", "a"), ("page", "two")])),
            Err(Error::InvalidPage(_))
        ));
    }
}
