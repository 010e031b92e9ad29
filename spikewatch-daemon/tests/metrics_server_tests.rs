//! Integration tests for metrics server functionality.

use spikewatch_core::config::MetricsConfig;
use spikewatch_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_unsupported_endpoint() {
    // Given: A custom endpoint path
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19108,
        endpoint: "/custom".to_owned(),
    };

    // When/Then: Rejected before anything is installed
    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(err.to_string().contains("/custom"));
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9108,
        endpoint: "/metrics".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: A valid loopback configuration on a non-standard port
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19109,
        endpoint: "/metrics".to_owned(),
    };

    // When: Installing the recorder (the HTTP listener needs a runtime)
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should succeed
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}
