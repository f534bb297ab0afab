//! Unit tests for configuration parsing, defaults, and validation.

use std::time::Duration;

use proxy_harness::config::HarnessConfig;
use proxy_harness::HarnessError;

#[test]
fn empty_toml_yields_defaults() {
    let config = HarnessConfig::from_toml_str("").expect("empty config is valid");
    assert_eq!(config.timing.settle_seconds, 5);
    assert_eq!(config.timing.concurrent_tasks, 15);
    assert_eq!(config.timing.hold_seconds, 8);
    assert_eq!(config.farm.command, "./proxy");
    assert_eq!(config.farm.port, 1653);
    assert!(config.farm.hosts.is_empty());
    assert!(!config.endpoints.server_host.is_empty());
}

#[test]
fn full_toml_round_trip() {
    let raw = r#"
[endpoints]
server_host = "http://origin.test"
blocked_host = "http://blocked.origin.test"

[timing]
settle_seconds = 1
request_timeout_seconds = 10
concurrent_tasks = 5
hold_seconds = 2

[farm]
hosts = ["myth9.stanford.edu", "myth10.stanford.edu"]
command = "./proxy --verbose"
remote_dir = "/home/student/assign"
port = 9999
"#;
    let config = HarnessConfig::from_toml_str(raw).expect("valid config");
    assert_eq!(config.endpoints.server_host, "http://origin.test");
    assert_eq!(config.timing.concurrent_tasks, 5);
    assert_eq!(config.farm.hosts.len(), 2);
    assert_eq!(
        config.farm.remote_dir.as_deref(),
        Some("/home/student/assign")
    );
    assert_eq!(config.settle_interval(), Duration::from_secs(1));
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.hold_interval(), Duration::from_secs(2));
}

#[test]
fn zero_concurrent_tasks_rejected() {
    let raw = "[timing]\nconcurrent_tasks = 0\n";
    let err = HarnessConfig::from_toml_str(raw).expect_err("must reject zero tasks");
    assert!(matches!(err, HarnessError::Config(_)), "got: {err}");
}

#[test]
fn zero_request_timeout_rejected() {
    let raw = "[timing]\nrequest_timeout_seconds = 0\n";
    let err = HarnessConfig::from_toml_str(raw).expect_err("must reject zero timeout");
    assert!(matches!(err, HarnessError::Config(_)), "got: {err}");
}

#[test]
fn empty_server_host_rejected() {
    let raw = "[endpoints]\nserver_host = \"\"\n";
    let err = HarnessConfig::from_toml_str(raw).expect_err("must reject empty host");
    assert!(matches!(err, HarnessError::Config(_)), "got: {err}");
}

#[test]
fn malformed_toml_is_config_error() {
    let err = HarnessConfig::from_toml_str("timing = \"nope\"").expect_err("invalid toml");
    assert!(matches!(err, HarnessError::Config(_)), "got: {err}");
}

#[test]
fn cache_dir_is_machine_scoped() {
    let dir = proxy_harness::config::cache_dir();
    let name = dir
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    assert!(name.starts_with(".proxy-cache-"), "got: {name}");
}
