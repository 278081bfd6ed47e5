//! Destination guard tests
//!
//! The forbidden backend port must be rejected for absolute and relative
//! URLs alike; every other port passes.

use pstream::api::{extract_port, DestinationGuard};

const PROXY: &str = "http://10.0.2.2:3003";
const BACKEND: &str = "http://10.0.2.2:3000";

fn guard() -> DestinationGuard {
    DestinationGuard::new(3000)
}

#[test]
fn test_explicit_forbidden_port_rejected() {
    let forbidden = [
        "http://localhost:3000",
        "http://localhost:3000/home",
        "http://127.0.0.1:3000/catalog/603",
        "https://example.com:3000/search?q=batman",
        "http://10.0.2.2:3000/",
    ];

    for url in forbidden {
        let err = guard().check(url, PROXY).unwrap_err();
        assert_eq!(err.port, 3000, "{url}");
        assert_eq!(err.url, url);
    }
}

#[test]
fn test_other_ports_allowed() {
    let allowed = [
        "http://example.com",
        "https://example.com/home",
        "http://localhost:3003/home",
        "http://localhost:8080",
        "http://localhost:30000",
        "http://localhost:300",
        "https://cdn.example.com:443/video.m3u8",
    ];

    for url in allowed {
        assert!(guard().check(url, PROXY).is_ok(), "{url}");
    }
}

#[test]
fn test_default_ports() {
    assert_eq!(extract_port("http://example.com/x", PROXY), Some(80));
    assert_eq!(extract_port("https://example.com/x", PROXY), Some(443));
    assert_eq!(extract_port("http://example.com:8443/x", PROXY), Some(8443));
}

#[test]
fn test_relative_paths_use_active_endpoint() {
    assert!(guard().check("/home", PROXY).is_ok());
    assert!(guard().check("search?q=x", PROXY).is_ok());

    let err = guard().check("/home", BACKEND).unwrap_err();
    assert_eq!(err.port, 3000);

    assert_eq!(extract_port("/catalog/1", PROXY), Some(3003));
    assert_eq!(extract_port("catalog/1", "https://proxy.example"), Some(443));
}

#[test]
fn test_error_message_names_port_and_url() {
    let err = guard().check("http://localhost:3000/home", PROXY).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("port 3000"));
    assert!(message.contains("Use proxy only"));
    assert!(message.contains("http://localhost:3000/home"));
}

#[test]
fn test_configurable_forbidden_port() {
    let guard = DestinationGuard::new(8080);
    assert_eq!(guard.forbidden_port(), 8080);
    assert!(guard.check("http://localhost:8080", PROXY).is_err());
    assert!(guard.check("http://localhost:3000", PROXY).is_ok());
}
