//! Canonical tracking keys for visited URLs.
//!
//! Visits are aggregated per canonical URL so trivially different spellings
//! of the same page (host case, default port, fragment) share one record.

use url::Url;

/// Errors that can occur while canonicalising a visited URL.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackingUrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS pages are tracked")]
    UnsupportedScheme,

    #[error("URL has no host")]
    MissingHost,
}

/// Parses `input` and returns it in canonical form.
///
/// # Canonicalisation Rules
///
/// 1. **Scheme**: only `http` and `https` are accepted
/// 2. **Host**: lowercased by the parser
/// 3. **Default ports**: removed (80 for HTTP, 443 for HTTPS)
/// 4. **Fragment**: removed, `#section` does not make a new page
/// 5. **Path and query**: preserved as-is
///
/// # Errors
///
/// Returns [`TrackingUrlError::InvalidFormat`] for unparsable input,
/// [`TrackingUrlError::UnsupportedScheme`] for anything but HTTP(S), and
/// [`TrackingUrlError::MissingHost`] for host-less URLs.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     canonical_url("HTTPS://Example.COM:443/Docs#intro").unwrap(),
///     "https://example.com/Docs"
/// );
/// ```
pub fn canonical_url(input: &str) -> Result<String, TrackingUrlError> {
    let mut url = parse_http(input)?;
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Parses `input` as an HTTP(S) URL with a host.
///
/// The `url` crate already drops default ports and lowercases hosts.
pub fn parse_http(input: &str) -> Result<Url, TrackingUrlError> {
    let url = Url::parse(input.trim())
        .map_err(|e| TrackingUrlError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(TrackingUrlError::UnsupportedScheme),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(TrackingUrlError::MissingHost);
    }

    Ok(url)
}

/// Host shown to the user, with a leading `www.` removed.
///
/// Falls back to the raw input when it does not parse.
pub fn display_host(input: &str) -> String {
    Url::parse(input)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .unwrap_or_else(|| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_lowercases_host() {
        assert_eq!(
            canonical_url("https://EXAMPLE.COM/Path").unwrap(),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_canonical_removes_default_ports() {
        assert_eq!(
            canonical_url("http://example.com:80/a").unwrap(),
            "http://example.com/a"
        );
        assert_eq!(
            canonical_url("https://example.com:443/a").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_canonical_keeps_custom_port_and_query() {
        assert_eq!(
            canonical_url("https://example.com:8443/search?q=rust&page=2").unwrap(),
            "https://example.com:8443/search?q=rust&page=2"
        );
    }

    #[test]
    fn test_canonical_drops_fragment() {
        assert_eq!(
            canonical_url("https://example.com/page?x=1#section").unwrap(),
            "https://example.com/page?x=1"
        );
    }

    #[test]
    fn test_canonical_adds_root_path() {
        assert_eq!(canonical_url("https://example.com").unwrap(), "https://example.com/");
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        for input in [
            "chrome://settings",
            "chrome-extension://abcdef/popup.html",
            "file:///etc/passwd",
            "javascript:alert(1)",
            "about:blank",
            "ftp://example.com/file",
        ] {
            assert_eq!(
                canonical_url(input),
                Err(TrackingUrlError::UnsupportedScheme),
                "{input}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(canonical_url(""), Err(TrackingUrlError::InvalidFormat(_))));
        assert!(matches!(canonical_url("example.com"), Err(TrackingUrlError::InvalidFormat(_))));
        assert!(matches!(canonical_url("not a url"), Err(TrackingUrlError::InvalidFormat(_))));
    }

    #[test]
    fn test_display_host_strips_www() {
        assert_eq!(display_host("https://www.example.com/a"), "example.com");
        assert_eq!(display_host("https://docs.rs/tokio"), "docs.rs");
        assert_eq!(display_host("not a url"), "not a url");
    }
}
