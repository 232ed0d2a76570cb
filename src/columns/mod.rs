use serde::{Deserialize, Serialize};
use std::fmt;

pub const BLOB_SLOTS: u8 = 20;
pub const DOUBLE_SLOTS: u8 = 20;

/// Physical column holding the store-assigned write time.
pub const TIMESTAMP: &str = "timestamp";

/// Physical column holding the sampling weight of each row.
pub const SAMPLE_INTERVAL: &str = "_sample_interval";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Blob(u8),
    Double(u8),
}

impl Slot {
    pub fn physical_name(&self) -> String {
        match self {
            Self::Blob(n) => format!("blob{}", n),
            Self::Double(n) => format!("double{}", n),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let (ctor, digits): (fn(u8) -> Slot, &str) = if let Some(d) = name.strip_prefix("blob") {
            (Slot::Blob, d)
        } else if let Some(d) = name.strip_prefix("double") {
            (Slot::Double, d)
        } else {
            return None;
        };
        let n: u8 = digits.parse().ok()?;
        let slot = ctor(n);
        slot.in_schema().then_some(slot)
    }

    /// Whether the slot exists in the store's fixed schema.
    pub fn in_schema(&self) -> bool {
        match *self {
            Self::Blob(n) => (1..=BLOB_SLOTS).contains(&n),
            Self::Double(n) => (1..=DOUBLE_SLOTS).contains(&n),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.physical_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Host,
    UserAgent,
    Path,
    Country,
    Referrer,
    BrowserName,
    /// Holds the client's operating system name.
    DeviceModel,
    SiteId,
    BrowserVersion,
    DeviceType,
    NewVisitor,
    NewSession,
    Bounce,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Host,
        Column::UserAgent,
        Column::Path,
        Column::Country,
        Column::Referrer,
        Column::BrowserName,
        Column::DeviceModel,
        Column::SiteId,
        Column::BrowserVersion,
        Column::DeviceType,
        Column::NewVisitor,
        Column::NewSession,
        Column::Bounce,
    ];

    pub fn slot(self) -> Slot {
        match self {
            Self::Host => Slot::Blob(1),
            Self::UserAgent => Slot::Blob(2),
            Self::Path => Slot::Blob(3),
            Self::Country => Slot::Blob(4),
            Self::Referrer => Slot::Blob(5),
            Self::BrowserName => Slot::Blob(6),
            Self::DeviceModel => Slot::Blob(7),
            Self::SiteId => Slot::Blob(8),
            Self::BrowserVersion => Slot::Blob(9),
            Self::DeviceType => Slot::Blob(10),
            Self::NewVisitor => Slot::Double(1),
            Self::NewSession => Slot::Double(2),
            Self::Bounce => Slot::Double(3),
        }
    }

    /// Physical column name, e.g. `blob3`.
    pub fn physical(self) -> String {
        self.slot().physical_name()
    }

    pub fn from_slot(slot: Slot) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slot() == slot)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::UserAgent => "userAgent",
            Self::Path => "path",
            Self::Country => "country",
            Self::Referrer => "referrer",
            Self::BrowserName => "browserName",
            Self::DeviceModel => "deviceModel",
            Self::SiteId => "siteId",
            Self::BrowserVersion => "browserVersion",
            Self::DeviceType => "deviceType",
            Self::NewVisitor => "newVisitor",
            Self::NewSession => "newSession",
            Self::Bounce => "bounce",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Columns a query may filter on with an exact-match value.
    pub fn is_filterable(self) -> bool {
        matches!(
            self,
            Self::Host
                | Self::Path
                | Self::Country
                | Self::Referrer
                | Self::BrowserName
                | Self::BrowserVersion
                | Self::DeviceModel
                | Self::DeviceType
        )
    }

    /// Columns a breakdown may group by.
    pub fn is_groupable(self) -> bool {
        self.is_filterable() || self == Self::UserAgent
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
