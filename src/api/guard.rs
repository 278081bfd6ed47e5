//! Destination guard
//!
//! Hard boundary: no client request may target the internal backend port.
//! Violations fail immediately, before any network I/O.

use thiserror::Error;
use url::Url;

/// Attempt to reach the forbidden backend port
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Direct backend access (port {port}) is forbidden. Use proxy only. Attempted URL: {url}")]
pub struct BackendAccessForbidden {
    pub url: String,
    pub port: u16,
}

/// Rejects URLs whose effective port is the forbidden one
#[derive(Debug, Clone, Copy)]
pub struct DestinationGuard {
    forbidden_port: u16,
}

impl DestinationGuard {
    pub fn new(forbidden_port: u16) -> Self {
        Self { forbidden_port }
    }

    pub fn forbidden_port(&self) -> u16 {
        self.forbidden_port
    }

    /// Fail if `url` resolves to the forbidden port.
    ///
    /// Relative URLs are resolved against `base`. Pure, no I/O.
    pub fn check(&self, url: &str, base: &str) -> Result<(), BackendAccessForbidden> {
        match extract_port(url, base) {
            Some(port) if port == self.forbidden_port => Err(BackendAccessForbidden {
                url: url.to_string(),
                port,
            }),
            _ => Ok(()),
        }
    }
}

/// Effective destination port of `url`.
///
/// An explicit port wins; otherwise the scheme default (443 for https, 80
/// for http). Returns `None` when the URL cannot be parsed.
pub fn extract_port(url: &str, base: &str) -> Option<u16> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            // Concatenate like the client does, so "/x" and "x" both land on base
            let base = base.trim_end_matches('/');
            let path = url.trim_start_matches('/');
            Url::parse(&format!("{}/{}", base, path)).ok()?
        }
        Err(_) => return None,
    };

    parsed.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://10.0.2.2:3003";

    #[test]
    fn test_extract_port_explicit() {
        assert_eq!(extract_port("http://10.0.2.2:3000/home", BASE), Some(3000));
        assert_eq!(extract_port("https://example.com:8443/x", BASE), Some(8443));
    }

    #[test]
    fn test_extract_port_scheme_defaults() {
        assert_eq!(extract_port("http://example.com/api", BASE), Some(80));
        assert_eq!(extract_port("https://example.com/api", BASE), Some(443));
        // An explicit default port is still the default port
        assert_eq!(extract_port("http://example.com:80/api", BASE), Some(80));
    }

    #[test]
    fn test_extract_port_relative_uses_base() {
        assert_eq!(extract_port("/home", BASE), Some(3003));
        assert_eq!(extract_port("search?q=x", BASE), Some(3003));
        assert_eq!(extract_port("/home", "http://10.0.2.2:3000"), Some(3000));
        assert_eq!(extract_port("/home", "https://proxy.example"), Some(443));
    }

    #[test]
    fn test_extract_port_unparseable() {
        assert_eq!(extract_port("http://[broken", BASE), None);
        assert_eq!(extract_port("/home", "__MOCK__"), None);
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let guard = DestinationGuard::new(3000);
        assert!(guard.check("HTTP://localhost:3000/api", BASE).is_err());
    }

    #[test]
    fn test_error_message() {
        let guard = DestinationGuard::new(3000);
        let err = guard.check("http://test:3000/api", BASE).unwrap_err();
        assert_eq!(err.port, 3000);
        assert_eq!(err.url, "http://test:3000/api");

        let msg = err.to_string();
        assert!(msg.contains("port 3000"));
        assert!(msg.contains("forbidden"));
        assert!(msg.contains("proxy only"));
        assert!(msg.contains("http://test:3000/api"));
    }
}
