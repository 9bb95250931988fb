//! Referrer normalization

use public_suffix::{EffectiveTLDProvider, DEFAULT_PROVIDER};
use url::Url;

/// Item recorded for traffic with no usable referrer.
pub const DIRECT: &str = "direct";

/// Collapse a raw referrer URL to its registrable domain (eTLD+1).
///
/// Empty or unparseable referrers count as direct traffic. When the
/// public-suffix lookup fails (IP literals, single-label hosts) the bare
/// host is kept instead.
pub fn normalize_referrer(referrer: &str) -> String {
    if referrer.is_empty() {
        return DIRECT.to_string();
    }

    let url = match Url::parse(referrer) {
        Ok(url) => url,
        Err(_) => return DIRECT.to_string(),
    };

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
        _ => return DIRECT.to_string(),
    };

    match DEFAULT_PROVIDER.effective_tld_plus_one(&host) {
        Ok(domain) => domain.to_ascii_lowercase(),
        Err(_) => host,
    }
}
