//! IP anonymization

use std::net::{AddrParseError, IpAddr, Ipv4Addr, Ipv6Addr};

/// Mask an IP for storage: IPv4 truncated to its /24 (last octet zeroed),
/// IPv6 truncated to its /64 (low 64 bits zeroed).
///
/// Input that does not parse as an IP is handed back via the error; callers
/// log it and keep the raw value.
pub fn anonymize_ip(raw: &str) -> Result<String, AddrParseError> {
    let addr: IpAddr = raw.trim().parse()?;
    Ok(mask(addr).to_string())
}

fn mask(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(v6) => {
            let [a, b, c, d, ..] = v6.segments();
            IpAddr::V6(Ipv6Addr::new(a, b, c, d, 0, 0, 0, 0))
        }
    }
}
