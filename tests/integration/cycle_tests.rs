//! Integration tests for the chain-cycle-detection scenario.

use std::time::Duration;

use proxy_harness::client::ProxyClient;
use proxy_harness::config::{EndpointConfig, TimingConfig};
use proxy_harness::scenario::{Scenario, ScenarioRunner};

use super::test_helpers::{StubMode, StubProxy};

fn runner(stub: &StubProxy) -> ScenarioRunner {
    let client = ProxyClient::new(&stub.addr, Duration::from_secs(5)).expect("client");
    let endpoints = EndpointConfig {
        server_host: "http://origin.test".to_owned(),
        blocked_host: "http://blocked.origin.test".to_owned(),
    };
    ScenarioRunner::new(client, endpoints, &TimingConfig::default())
}

#[tokio::test]
async fn a_504_outcome_counts_as_cycle_detected() {
    let stub = StubProxy::start(StubMode::GatewayTimeout).await;
    let report = runner(&stub).run(Scenario::ChainCycleDetection).await;
    assert!(report.is_pass(), "failures: {:?}", report.failures());
}

#[tokio::test]
async fn a_bare_504_line_counts_as_cycle_detected() {
    // No HTTP parser accepts a status line without a protocol preamble, so
    // the first request comes back as a transport failure; the raw re-check
    // must still recognize the 504.
    let stub = StubProxy::start(StubMode::Malformed504).await;
    let report = runner(&stub).run(Scenario::ChainCycleDetection).await;
    assert!(report.is_pass(), "failures: {:?}", report.failures());
}

#[tokio::test]
async fn a_200_outcome_means_the_cycle_went_undetected() {
    let stub = StubProxy::start(StubMode::Ok).await;
    let report = runner(&stub).run(Scenario::ChainCycleDetection).await;

    assert!(!report.is_pass());
    assert!(
        report
            .failures()
            .iter()
            .any(|f| f.contains("gateway-timeout")),
        "failures: {:?}",
        report.failures()
    );
}

#[tokio::test]
async fn cycle_check_is_bounded_by_the_client_timeout() {
    // A proxy that loops instead of answering never produces a response;
    // the client timeout converts that into a reportable failure.
    let stub = StubProxy::start(StubMode::Hang).await;
    let client = ProxyClient::new(&stub.addr, Duration::from_secs(2)).expect("client");
    let endpoints = EndpointConfig {
        server_host: "http://origin.test".to_owned(),
        blocked_host: "http://blocked.origin.test".to_owned(),
    };
    let runner = ScenarioRunner::new(client, endpoints, &TimingConfig::default());

    let started = std::time::Instant::now();
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        runner.run(Scenario::ChainCycleDetection),
    )
    .await
    .expect("scenario must not hang");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!report.is_pass(), "a non-answer is not cycle detection");
}
