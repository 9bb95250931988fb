//! GeoIP lookup module using MaxMind GeoLite2 databases
//!
//! Readers are opened once at startup by the composition root and shared
//! read-only behind an `Arc` - there is no lazy global state.

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Geographic fields attached to an event. Empty strings when unknown;
/// lookup failure never fails ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: String,
    pub subdivision: String,
    pub city: String,
    pub isp: String,
}

/// GeoIP reader wrapper
pub struct GeoIp {
    city: Option<Reader<Vec<u8>>>,
    asn: Option<Reader<Vec<u8>>>,
}

impl GeoIp {
    /// Create a new GeoIP instance, loading whichever databases are present
    pub fn new(city_path: &str, asn_path: &str) -> Self {
        Self {
            city: open_reader(city_path, "GeoLite2-City"),
            asn: open_reader(asn_path, "GeoLite2-ASN"),
        }
    }

    /// Create an instance with no databases (lookups return empty fields)
    pub fn disabled() -> Self {
        Self {
            city: None,
            asn: None,
        }
    }

    /// Look up an IP address. Private/local addresses and lookup misses
    /// yield empty fields.
    pub fn lookup(&self, ip: &str) -> GeoInfo {
        let mut info = GeoInfo::default();

        let addr: IpAddr = match ip.parse() {
            Ok(addr) => addr,
            Err(_) => return info,
        };

        // Skip private/local IPs
        if is_private_ip(&addr) {
            return info;
        }

        if let Some(reader) = &self.city {
            if let Ok(Some(city)) = reader.lookup(addr).and_then(|r| r.decode::<geoip2::City>()) {
                info.country = city
                    .country
                    .iso_code
                    .unwrap_or_default()
                    .to_string();
                info.subdivision = city
                    .subdivisions
                    .first()
                    .and_then(|s| s.iso_code)
                    .unwrap_or_default()
                    .to_string();
                info.city = city
                    .city
                    .names
                    .english
                    .unwrap_or_default()
                    .to_string();
            }
        }

        if let Some(reader) = &self.asn {
            if let Ok(Some(asn)) = reader.lookup(addr).and_then(|r| r.decode::<geoip2::Asn>()) {
                info.isp = asn
                    .autonomous_system_organization
                    .unwrap_or_default()
                    .to_string();
            }
        }

        info
    }

    /// Check if at least one GeoIP database is loaded
    pub fn is_available(&self) -> bool {
        self.city.is_some() || self.asn.is_some()
    }
}

fn open_reader(database_path: &str, kind: &str) -> Option<Reader<Vec<u8>>> {
    if database_path.is_empty() {
        return None;
    }

    let path = Path::new(database_path);
    if !path.exists() {
        warn!("{} database not found at: {}", kind, database_path);
        return None;
    }

    match Reader::open_readfile(path) {
        Ok(reader) => {
            info!("{} database loaded: {}", kind, database_path);
            Some(reader)
        }
        Err(e) => {
            warn!("Failed to load {} database: {}", kind, e);
            None
        }
    }
}

/// Check if an IP address is private/local
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified(),
    }
}

/// Thread-safe GeoIP wrapper
pub type SharedGeoIp = Arc<GeoIp>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_databases_degrade_to_empty_fields() {
        let geoip = GeoIp::new("does-not-exist.mmdb", "");
        assert!(!geoip.is_available());
        assert_eq!(geoip.lookup("8.8.8.8"), GeoInfo::default());
    }

    #[test]
    fn private_and_malformed_ips_yield_empty_fields() {
        let geoip = GeoIp::disabled();
        assert_eq!(geoip.lookup("192.168.1.10"), GeoInfo::default());
        assert_eq!(geoip.lookup("not-an-ip"), GeoInfo::default());
    }
}
