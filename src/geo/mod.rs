use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

/// Country lookup backed by an optional MaxMind country or city database.
pub struct GeoIpLookup {
    reader: Option<Reader<Vec<u8>>>,
}

impl GeoIpLookup {
    /// A missing or unreadable database disables lookups instead of failing.
    pub fn new(db_path: Option<&str>) -> Self {
        let reader = db_path.and_then(|path| {
            if !Path::new(path).exists() {
                warn!("GeoIP database not found at {}", path);
                return None;
            }
            match Reader::open_readfile(path) {
                Ok(reader) => {
                    debug!("Loaded GeoIP database from {}", path);
                    Some(reader)
                }
                Err(e) => {
                    warn!("Failed to load GeoIP database: {}", e);
                    None
                }
            }
        });

        Self { reader }
    }

    pub fn disabled() -> Self {
        Self { reader: None }
    }

    /// ISO code of the country the address belongs to, if known.
    pub fn country(&self, ip: &str) -> Option<String> {
        let reader = self.reader.as_ref()?;
        let ip_addr: IpAddr = ip.trim().parse().ok()?;

        // City records carry the same country block, so this works for both editions.
        match reader.lookup::<geoip2::Country>(ip_addr) {
            Ok(record) => record
                .country
                .and_then(|c| c.iso_code)
                .map(str::to_string),
            Err(e) => {
                debug!("GeoIP lookup for {} failed: {}", ip_addr, e);
                None
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.reader.is_some()
    }
}
