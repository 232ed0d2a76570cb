use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::columns::{Column, Slot, BLOB_SLOTS, DOUBLE_SLOTS};
use crate::store::DataPoint;

use super::types::{DeviceType, Granularity};

/// One page view as written to the analytics store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub site_id: String,
    pub host: String,
    pub path: String,
    pub referrer: String,
    pub country: String,
    pub user_agent: String,
    pub browser_name: String,
    pub browser_version: String,
    // Operating system name, see `ParsedUserAgent::device_model`.
    pub device_model: String,
    pub device_type: DeviceType,
    pub new_visitor: f64,
    pub new_session: f64,
    pub bounce: f64,
}

impl EventRecord {
    fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::Host => Some(&self.host),
            Column::UserAgent => Some(&self.user_agent),
            Column::Path => Some(&self.path),
            Column::Country => Some(&self.country),
            Column::Referrer => Some(&self.referrer),
            Column::BrowserName => Some(&self.browser_name),
            Column::DeviceModel => Some(&self.device_model),
            Column::SiteId => Some(&self.site_id),
            Column::BrowserVersion => Some(&self.browser_version),
            Column::DeviceType => Some(self.device_type.as_str()),
            Column::NewVisitor | Column::NewSession | Column::Bounce => None,
        }
    }

    fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::NewVisitor => Some(self.new_visitor),
            Column::NewSession => Some(self.new_session),
            Column::Bounce => Some(self.bounce),
            _ => None,
        }
    }

    /// Lay the record out on the physical schema. Each value lands in the
    /// slot its column maps to; slots with no column stay empty.
    pub fn to_data_point(&self) -> DataPoint {
        let mut blobs = vec![String::new(); BLOB_SLOTS as usize];
        let mut doubles = vec![0.0; DOUBLE_SLOTS as usize];

        for column in Column::ALL {
            match column.slot() {
                Slot::Blob(n) if (1..=BLOB_SLOTS).contains(&n) => {
                    if let Some(value) = self.text(column) {
                        blobs[(n - 1) as usize] = value.to_string();
                    }
                }
                Slot::Double(n) if (1..=DOUBLE_SLOTS).contains(&n) => {
                    if let Some(value) = self.number(column) {
                        doubles[(n - 1) as usize] = value;
                    }
                }
                slot => warn!("Dropping {} mapped outside the schema ({})", column, slot),
            }
        }

        blobs.truncate(highest_mapped(|slot| match slot {
            Slot::Blob(n) => Some(n),
            Slot::Double(_) => None,
        }));
        doubles.truncate(highest_mapped(|slot| match slot {
            Slot::Double(n) => Some(n),
            Slot::Blob(_) => None,
        }));

        DataPoint {
            index: self.site_id.clone(),
            blobs,
            doubles,
        }
    }
}

/// Highest slot number of one kind that any column maps to.
fn highest_mapped(kind: impl Fn(Slot) -> Option<u8>) -> usize {
    Column::ALL
        .into_iter()
        .filter_map(|c| kind(c.slot()))
        .max()
        .map_or(0, usize::from)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub views: i64,
    pub visitors: i64,
    pub bounces: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedItem {
    pub value: String,
    pub views: i64,
    pub visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub column: Column,
    pub page: u32,
    pub has_more: bool,
    pub rows: Vec<CountedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub bucket: NaiveDateTime,
    #[serde(flatten)]
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub timezone: String,
    pub buckets: Vec<TimeBucket>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarliestEvents {
    pub earliest_event: Option<DateTime<Utc>>,
    pub earliest_bounce: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BounceRate {
    Available { value: f64 },
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(flatten)]
    pub counts: Counts,
    pub bounce_rate: BounceRate,
    #[serde(flatten)]
    pub earliest: EarliestEvents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteHits {
    pub site_id: String,
    pub views: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EventRecord {
        EventRecord {
            site_id: "example".to_string(),
            host: "example.com".to_string(),
            path: "/blog".to_string(),
            referrer: "https://news.ycombinator.com/".to_string(),
            country: "CA".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            browser_name: "Firefox".to_string(),
            browser_version: "121.0".to_string(),
            device_model: String::new(),
            device_type: DeviceType::Desktop,
            new_visitor: 1.0,
            new_session: 1.0,
            bounce: 1.0,
        }
    }

    #[test]
    fn test_data_point_uses_fixed_slots() {
        let point = sample_event().to_data_point();
        assert_eq!(point.index, "example");
        assert_eq!(point.blobs[0], "example.com");
        assert_eq!(point.blobs[2], "/blog");
        assert_eq!(point.blobs[3], "CA");
        assert_eq!(point.blobs[5], "Firefox");
        assert_eq!(point.blobs[7], "example");
        assert_eq!(point.blobs[9], "desktop");
        assert_eq!(point.doubles, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_field_does_not_shift_neighbours() {
        let mut event = sample_event();
        event.host = String::new();
        event.country = String::new();
        let point = event.to_data_point();
        assert_eq!(point.blobs[0], "");
        assert_eq!(point.blobs[2], "/blog");
        assert_eq!(point.blobs[3], "");
        assert_eq!(point.blobs[4], "https://news.ycombinator.com/");
    }

    #[test]
    fn test_zero_flags_still_fill_mapped_doubles() {
        let mut event = sample_event();
        event.new_visitor = 0.0;
        event.new_session = 0.0;
        event.bounce = 0.0;
        assert_eq!(event.to_data_point().doubles, vec![0.0, 0.0, 0.0]);

        event.bounce = -1.0;
        assert_eq!(event.to_data_point().doubles, vec![0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_bounce_rate_serialization() {
        let available = serde_json::to_value(BounceRate::Available { value: 0.25 }).unwrap();
        assert_eq!(available["status"], "available");
        assert_eq!(available["value"], 0.25);

        let insufficient = serde_json::to_value(BounceRate::InsufficientData).unwrap();
        assert_eq!(insufficient["status"], "insufficient_data");
    }

    #[test]
    fn test_stats_serialization_is_flat() {
        let stats = Stats {
            counts: Counts {
                views: 10,
                visitors: 4,
                bounces: 1,
            },
            bounce_rate: BounceRate::Available { value: 0.25 },
            earliest: EarliestEvents::default(),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["views"], 10);
        assert_eq!(json["visitors"], 4);
        assert_eq!(json["bounces"], 1);
        assert_eq!(json["bounceRate"]["status"], "available");
        assert!(json["earliestEvent"].is_null());
    }
}
