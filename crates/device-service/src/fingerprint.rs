//! Device fingerprint and user-agent derivation.
//!
//! A fingerprint is the SHA-256 digest of the normalized device metadata
//! submitted at registration. The same browser on the same machine
//! produces the same fingerprint, which is what makes re-registration
//! idempotent; a different browser, resolution, or timezone produces a
//! new device.
//!
//! Browser/OS detection is deliberately coarse substring matching over
//! the user agent: it only feeds the human-readable device name shown to
//! admins, never an authorization decision.

use ring::digest::{digest, SHA256};

/// Derive the device fingerprint from normalized metadata.
///
/// Fields are trimmed and joined with a separator that cannot appear in
/// the inputs ambiguously, then hashed. The result is a 64-char lowercase
/// hex string.
pub fn derive_fingerprint(
    platform: &str,
    screen_resolution: &str,
    timezone: &str,
    user_agent: &str,
) -> String {
    let normalized = format!(
        "{}|{}|{}|{}",
        platform.trim(),
        screen_resolution.trim(),
        timezone.trim(),
        user_agent.trim()
    );

    hex::encode(digest(&SHA256, normalized.as_bytes()).as_ref())
}

/// Detect the browser family from a user agent.
pub fn detect_browser(user_agent: &str) -> &'static str {
    // Order matters: Chromium-family browsers embed "Chrome", and every
    // WebKit browser embeds "Safari".
    if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Firefox/") {
        "Firefox"
    } else if user_agent.contains("Chrome/") || user_agent.contains("Chromium/") {
        "Chrome"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else {
        "Unknown"
    }
}

/// Detect the operating system from a user agent.
pub fn detect_os(user_agent: &str) -> &'static str {
    // iPhone/iPad user agents embed "like Mac OS X", and Android user
    // agents embed "Linux"; check the specific platforms first.
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    }
}

/// Derive the human-readable device name shown in the admin dashboard.
pub fn device_name(user_agent: &str) -> String {
    format!("{} on {}", detect_browser(user_agent), detect_os(user_agent))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
    const SAFARI_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
    const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = derive_fingerprint("Win32", "1920x1080", "Europe/Berlin", CHROME_WINDOWS);
        let b = derive_fingerprint("Win32", "1920x1080", "Europe/Berlin", CHROME_WINDOWS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_trims_whitespace() {
        let a = derive_fingerprint("Win32", "1920x1080", "Europe/Berlin", CHROME_WINDOWS);
        let b = derive_fingerprint(" Win32 ", "1920x1080 ", " Europe/Berlin", CHROME_WINDOWS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_any_field() {
        let base = derive_fingerprint("Win32", "1920x1080", "Europe/Berlin", CHROME_WINDOWS);

        assert_ne!(
            base,
            derive_fingerprint("MacIntel", "1920x1080", "Europe/Berlin", CHROME_WINDOWS)
        );
        assert_ne!(
            base,
            derive_fingerprint("Win32", "2560x1440", "Europe/Berlin", CHROME_WINDOWS)
        );
        assert_ne!(
            base,
            derive_fingerprint("Win32", "1920x1080", "America/New_York", CHROME_WINDOWS)
        );
        assert_ne!(
            base,
            derive_fingerprint("Win32", "1920x1080", "Europe/Berlin", FIREFOX_LINUX)
        );
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = derive_fingerprint("Win32", "1920x1080", "UTC", CHROME_WINDOWS);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_detect_browser() {
        assert_eq!(detect_browser(CHROME_WINDOWS), "Chrome");
        assert_eq!(detect_browser(SAFARI_MAC), "Safari");
        assert_eq!(detect_browser(FIREFOX_LINUX), "Firefox");
        assert_eq!(detect_browser(EDGE_WINDOWS), "Edge");
        assert_eq!(detect_browser("curl/8.5.0"), "Unknown");
    }

    #[test]
    fn test_detect_os() {
        assert_eq!(detect_os(CHROME_WINDOWS), "Windows");
        assert_eq!(detect_os(SAFARI_MAC), "macOS");
        assert_eq!(detect_os(FIREFOX_LINUX), "Linux");
        assert_eq!(detect_os(SAFARI_IPHONE), "iOS");
        assert_eq!(detect_os(CHROME_ANDROID), "Android");
        assert_eq!(detect_os("curl/8.5.0"), "Unknown");
    }

    #[test]
    fn test_device_name() {
        assert_eq!(device_name(CHROME_WINDOWS), "Chrome on Windows");
        assert_eq!(device_name(SAFARI_IPHONE), "Safari on iOS");
        assert_eq!(device_name(CHROME_ANDROID), "Chrome on Android");
    }
}
