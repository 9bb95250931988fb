//! User-agent classification
//!
//! Small substring-based classifier: device class, browser family, OS
//! family and a bot flag. Match order matters - several browsers embed the
//! tokens of others (Edge and Opera both carry "Chrome", everything WebKit
//! carries "Safari").

/// Parsed user-agent fields attached to every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub device: String,
    pub browser: String,
    pub os: String,
    pub is_bot: bool,
}

const UNKNOWN: &str = "Unknown";

const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "crawling",
    "slurp",
    "headless",
    "facebookexternalhit",
    "curl/",
    "wget/",
    "python-requests",
    "python-urllib",
    "go-http-client",
    "okhttp",
];

/// Classify a User-Agent header value. Empty or unrecognized input yields
/// "Unknown" fields and a false bot flag rather than an error.
pub fn parse_user_agent(raw: &str) -> UserAgent {
    let ua = raw.trim().to_ascii_lowercase();
    if ua.is_empty() {
        return UserAgent {
            device: UNKNOWN.to_string(),
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            is_bot: false,
        };
    }

    let is_bot = BOT_MARKERS.iter().any(|marker| ua.contains(marker));
    let os = detect_os(&ua);
    let browser = detect_browser(&ua);
    let device = detect_device(&ua, os);

    UserAgent {
        device: device.to_string(),
        browser: browser.to_string(),
        os: os.to_string(),
        is_bot,
    }
}

fn detect_os(ua: &str) -> &'static str {
    if ua.contains("windows nt") || ua.contains("windows phone") {
        "Windows"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        "iOS"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("cros") {
        "Chrome OS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

fn detect_browser(ua: &str) -> &'static str {
    if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("samsungbrowser/") {
        "Samsung Internet"
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        "Firefox"
    } else if ua.contains("chrome/") || ua.contains("crios/") || ua.contains("chromium/") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.contains("msie") || ua.contains("trident/") {
        "Internet Explorer"
    } else {
        UNKNOWN
    }
}

fn detect_device(ua: &str, os: &'static str) -> &'static str {
    if ua.contains("ipad") || ua.contains("tablet") {
        "Tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("ipod") {
        "Mobile"
    } else if os != UNKNOWN {
        "Desktop"
    } else {
        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn desktop_chrome() {
        let ua = parse_user_agent(CHROME_LINUX);
        assert_eq!(ua.device, "Desktop");
        assert_eq!(ua.browser, "Chrome");
        assert_eq!(ua.os, "Linux");
        assert!(!ua.is_bot);
    }

    #[test]
    fn iphone_safari() {
        let ua = parse_user_agent(SAFARI_IPHONE);
        assert_eq!(ua.device, "Mobile");
        assert_eq!(ua.browser, "Safari");
        assert_eq!(ua.os, "iOS");
        assert!(!ua.is_bot);
    }

    #[test]
    fn crawler_flagged_as_bot() {
        let ua = parse_user_agent(GOOGLEBOT);
        assert!(ua.is_bot);
    }

    #[test]
    fn curl_flagged_as_bot() {
        assert!(parse_user_agent("curl/8.4.0").is_bot);
    }

    #[test]
    fn empty_input_degrades_to_unknown() {
        let ua = parse_user_agent("");
        assert_eq!(ua.device, "Unknown");
        assert_eq!(ua.browser, "Unknown");
        assert_eq!(ua.os, "Unknown");
        assert!(!ua.is_bot);
    }
}
