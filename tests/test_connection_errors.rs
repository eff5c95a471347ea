//! Integration tests for connection timeout, DNS and retry handling.

use sqream_thin_rs::{ConnectParams, Connection, Error, ErrorKind};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_connection_timeout_unreachable_host() {
    // 192.0.2.1 is a TEST-NET address that should be unreachable (RFC 5737)
    let params = ConnectParams::new("192.0.2.1", 5000, "master")
        .with_connect_timeout(Duration::from_secs(2))
        .with_retry(1, Duration::ZERO);

    let start = Instant::now();
    let result = Connection::connect_with_params(&params, "user", "pass").await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::ConnectionTimeout { .. })));
    // Should timeout within 5 seconds (with some margin for OS scheduling)
    assert!(
        elapsed < Duration::from_secs(5),
        "Timeout took too long: {:?}",
        elapsed
    );

    if let Err(Error::ConnectionTimeout {
        host,
        port,
        timeout,
    }) = result
    {
        assert_eq!(host, "192.0.2.1");
        assert_eq!(port, 5000);
        assert_eq!(timeout, Duration::from_secs(2));
    }
}

#[tokio::test]
async fn test_dns_resolution_failure() {
    let params = ConnectParams::new(
        "this-hostname-definitely-does-not-exist-12345.invalid",
        5000,
        "master",
    )
    .with_retry(1, Duration::ZERO);

    let result = Connection::connect_with_params(&params, "user", "pass").await;
    assert!(matches!(result, Err(Error::DnsResolutionFailed { .. })));

    if let Err(err @ Error::DnsResolutionFailed { .. }) = result {
        assert_eq!(err.kind(), ErrorKind::Connection);
        if let Error::DnsResolutionFailed { hostname, message } = err {
            assert_eq!(
                hostname,
                "this-hostname-definitely-does-not-exist-12345.invalid"
            );
            assert!(!message.is_empty());
        }
    }
}

#[tokio::test]
async fn test_retries_are_spaced_by_interval() {
    // 198.51.100.1 is another TEST-NET address
    let params = ConnectParams::new("198.51.100.1", 5000, "master")
        .with_connect_timeout(Duration::from_millis(300))
        .with_retry(2, Duration::from_millis(500));

    let start = Instant::now();
    let result = Connection::connect_with_params(&params, "user", "pass").await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::ConnectionTimeout { .. })));
    // Two timeouts plus one pause
    assert!(elapsed >= Duration::from_millis(1100), "Retried too fast: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "Retried too slowly: {:?}", elapsed);
}

#[tokio::test]
async fn test_invalid_connect_string() {
    let result = Connection::connect("localhost:notaport/master", "user", "pass").await;
    let err = result.err().unwrap();
    assert!(matches!(err, Error::InvalidConnectString { .. }));
    assert_eq!(err.kind(), ErrorKind::Interface);
}

#[tokio::test]
async fn test_default_timeout_is_20_seconds() {
    let params = ConnectParams::new("localhost", 5000, "master");
    assert_eq!(params.connect_timeout, Duration::from_secs(20));
}

#[tokio::test]
async fn test_custom_timeout_via_builder() {
    let params = ConnectParams::new("localhost", 5000, "master")
        .with_connect_timeout(Duration::from_secs(10));
    assert_eq!(params.connect_timeout, Duration::from_secs(10));
}
