//! Scenario execution against a running proxy chain.

use std::time::Duration;

use tracing::info;

use crate::client::{BodyMode, ConcurrentTask, ProxyClient, RequestOutcome};
use crate::config::{EndpointConfig, TimingConfig};
use crate::scenario::{Report, Scenario};

/// Marker the blocked origin embeds in bodies that leaked through.
const LEAK_MARKER: &str = "You shouldn't be able to see this!";

/// Task count for the no-head-of-line-blocking scenario.
const HOL_TASKS: usize = 5;

/// Hold interval for the no-head-of-line-blocking scenario.
const HOL_HOLD: Duration = Duration::from_secs(2);

/// Task count for the load scenario.
const LOAD_TASKS: usize = 21;

/// Hold interval for the simultaneous scenario.
const SIMULTANEOUS_HOLD: Duration = Duration::from_secs(5);

/// Drives one named scenario against the chain entry point and accumulates
/// every assertion failure into a [`Report`].
#[derive(Debug)]
pub struct ScenarioRunner {
    client: ProxyClient,
    endpoints: EndpointConfig,
    concurrent_tasks: usize,
    hold: Duration,
}

impl ScenarioRunner {
    /// Build a runner over an already-configured client.
    #[must_use]
    pub fn new(client: ProxyClient, endpoints: EndpointConfig, timing: &TimingConfig) -> Self {
        Self {
            client,
            endpoints,
            concurrent_tasks: timing.concurrent_tasks,
            hold: Duration::from_secs(timing.hold_seconds),
        }
    }

    /// Run the selected scenario to completion and return its report.
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self, scenario: Scenario) -> Report {
        info!(scenario = scenario.name(), "scenario starting");
        let mut report = Report::new(scenario.name());
        let origin = self.endpoints.server_host.clone();

        match scenario {
            Scenario::CacheHit => {
                let url = format!("{origin}/basic-cacheable?printrequests");
                self.basic(&mut report, &[url.clone(), url], true, BodyMode::Full, 0)
                    .await;
            }
            Scenario::NoExtraRequests => {
                let urls = [
                    format!("{origin}/basic-cacheable"),
                    format!("{origin}/basic-cacheable"),
                    format!("{origin}/basic-uncacheable?printrequests"),
                ];
                self.basic(&mut report, &urls, true, BodyMode::Full, 0).await;
            }
            Scenario::NoInvalidCaching => {
                let url = format!("{origin}/basic-uncacheable?printrequests");
                self.basic(&mut report, &[url.clone(), url], true, BodyMode::Full, 0)
                    .await;
            }
            Scenario::HeaderForwarding => self.header_forwarding(&mut report).await,
            Scenario::BlockList => self.block_list(&mut report).await,
            Scenario::ConcurrencyBound => {
                self.concurrent(
                    &mut report,
                    |i| format!("{origin}/long-poll?id={i}"),
                    self.concurrent_tasks,
                    self.hold,
                    &[format!("{origin}/long-poll-release?printrequests")],
                    BodyMode::Full,
                )
                .await;
            }
            Scenario::NoHeadOfLineBlocking => {
                self.concurrent(
                    &mut report,
                    |i| format!("{origin}/long-poll?id={i}"),
                    HOL_TASKS,
                    HOL_HOLD,
                    &[
                        format!("{origin}/static/plaintext.txt"),
                        format!("{origin}/long-poll-release?printrequests"),
                    ],
                    BodyMode::Full,
                )
                .await;
            }
            Scenario::Load => {
                self.concurrent(
                    &mut report,
                    |i| format!("{origin}/static/{}.html", i / 3 + 1),
                    LOAD_TASKS,
                    Duration::ZERO,
                    &[],
                    BodyMode::Hash,
                )
                .await;
            }
            Scenario::Simultaneous => {
                let url = format!("{origin}/delayed-request?printrequests");
                self.concurrent(
                    &mut report,
                    |_| url.clone(),
                    1,
                    SIMULTANEOUS_HOLD,
                    &[url.clone()],
                    BodyMode::Full,
                )
                .await;
            }
            Scenario::StaticHtml => {
                let url = format!("{origin}/static/1.html");
                self.basic(&mut report, &[url], false, BodyMode::Hash, 0).await;
            }
            Scenario::StaticImage => {
                let url = format!("{origin}/static/logo.png");
                self.basic(&mut report, &[url], false, BodyMode::Hash, 0).await;
            }
            Scenario::StaticText => {
                let url = format!("{origin}/static/plaintext.txt");
                self.basic(&mut report, &[url], false, BodyMode::Hash, 0).await;
            }
            Scenario::ChainCycleDetection => self.cycle_detection(&mut report).await,
        }

        report
    }

    /// Acquire the session cookie and require success before anything else
    /// in the scenario runs.
    async fn ensure_session(&self, report: &mut Report) -> bool {
        let outcome = self
            .client
            .acquire_session(&self.endpoints.server_host)
            .await;
        if outcome.is_success() {
            return true;
        }
        println!("Failed to get session cookie");
        println!("{}", outcome.render(BodyMode::Full));
        report.fail(format!(
            "session acquisition failed: {}",
            outcome.render(BodyMode::Silent)
        ));
        false
    }

    /// Sequential request plan: optional session acquisition, then one
    /// request per url, printed in order.
    async fn basic(
        &self,
        report: &mut Report,
        urls: &[String],
        acquire: bool,
        mode: BodyMode,
        start_index: usize,
    ) {
        if acquire && !self.ensure_session(report).await {
            return;
        }

        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push((url, self.client.request(url, &[]).await));
        }

        for (i, (url, outcome)) in results.iter().enumerate() {
            println!("********** Request {} **********", i + start_index);
            println!("{}", outcome.render(mode));
            if let RequestOutcome::Failure { message } = outcome {
                report.fail(format!("request {} to {url} failed: {message}", i + start_index));
            }
        }
    }

    /// Header-rewriting probe: plain request, request with a caller-supplied
    /// `x-forwarded-for`, and an uncacheable variant.
    async fn header_forwarding(&self, report: &mut Report) {
        if !self.ensure_session(report).await {
            return;
        }
        let origin = &self.endpoints.server_host;

        let results = [
            self.client
                .request(&format!("{origin}/basic-cacheable?printheaders"), &[])
                .await,
            self.client
                .request(
                    &format!("{origin}/basic-cacheable?printheaders"),
                    &[("x-forwarded-for", "10.11.12.13")],
                )
                .await,
            self.client
                .request(&format!("{origin}/basic-uncacheable?printheaders"), &[])
                .await,
        ];

        for (i, outcome) in results.iter().enumerate() {
            println!("********** Request {i} **********");
            println!("{}", outcome.render(BodyMode::Full));
            if let RequestOutcome::Failure { message } = outcome {
                report.fail(format!("header probe {i} failed: {message}"));
            }
        }
    }

    /// Block-list enforcement: a blocked request that comes back as a
    /// transport failure or a bodiless refusal counts as blocked; the leak
    /// marker in a body proves the request got through.
    async fn block_list(&self, report: &mut Report) {
        if !self.ensure_session(report).await {
            return;
        }
        let blocked = &self.endpoints.blocked_host;
        let urls = [
            format!("{blocked}/forbidden-cacheable"),
            format!("{blocked}/forbidden-uncacheable"),
        ];

        for (i, url) in urls.iter().enumerate() {
            let outcome = self.client.request(url, &[]).await;
            println!("********** Request {i} **********");
            if outcome.body_contains(LEAK_MARKER) {
                println!("Not blocked");
                report.fail(format!("blocked request to {url} got through"));
            } else {
                println!("Blocked");
            }
        }

        // Origin request-count probe, numbered after the blocked pair.
        let probe = format!(
            "{}/basic-uncacheable?printrequests",
            self.endpoints.server_host
        );
        self.basic(report, &[probe], false, BodyMode::Full, urls.len())
            .await;
    }

    /// The central concurrency algorithm; see the harness documentation for
    /// the step-by-step contract.
    async fn concurrent(
        &self,
        report: &mut Report,
        target: impl Fn(usize) -> String,
        count: usize,
        hold: Duration,
        others: &[String],
        mode: BodyMode,
    ) {
        // 1. Session first, sequentially; nothing runs without it.
        if !self.ensure_session(report).await {
            return;
        }

        // 2. Launch the parallel tasks.
        let tasks: Vec<ConcurrentTask> = (0..count)
            .map(|i| ConcurrentTask::launch(self.client.clone(), target(i)))
            .collect();

        // 3. Give the proxy the whole hold interval to (wrongly) finish one.
        tokio::time::sleep(hold).await;

        // 4. With a positive hold, any finished task means the proxy is not
        //    holding all `count` connections concurrently.
        let early: Vec<String> = if hold.is_zero() {
            Vec::new()
        } else {
            tasks
                .iter()
                .filter(|task| task.is_finished())
                .map(|task| task.url().to_owned())
                .collect()
        };

        // 5. While the tasks pend, unrelated requests must still get through.
        if early.is_empty() {
            for url in others {
                let outcome = self.client.request(url, &[]).await;
                println!("********** Request to url {url} **********");
                println!("{}", outcome.render(mode));
                if !outcome.is_success() {
                    report.fail(format!(
                        "probe to {url} did not succeed while tasks were pending: {}",
                        outcome.render(BodyMode::Silent)
                    ));
                }
            }
        }

        // 6. Join everything and report deterministically, sorted by url.
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.join().await);
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));

        for (url, outcome) in &results {
            println!("********** CONCURRENT Request to url {url} **********");
            println!("{}", outcome.render(mode));
            if early.contains(url) {
                report.fail(format!(
                    "task to {url} completed before the hold interval elapsed: {}",
                    outcome.render(BodyMode::Silent)
                ));
            }
            if let RequestOutcome::Failure { message } = outcome {
                report.fail(format!("concurrent request to {url} failed: {message}"));
            }
        }
    }

    /// Cycle detection: one request into a mutually-forwarding pair must
    /// come back as a gateway timeout within the client's bounded timeout.
    /// A proxy may detect the cycle but answer with a bare `504 ...` line
    /// the transport cannot parse; a raw re-check of the entry settles those.
    async fn cycle_detection(&self, report: &mut Report) {
        let url = format!("{}/static/plaintext.txt", self.endpoints.server_host);
        let outcome = self.client.request(&url, &[]).await;

        match outcome {
            RequestOutcome::Success { status: 504, .. } => {
                println!("Looks like you detected a cycle.");
            }
            RequestOutcome::Failure { message } => {
                // Transport parse errors never quote the response bytes, so
                // ask the entry directly what its first status token was.
                let token = self.client.raw_first_token(&url).await;
                if token.as_deref() == Some("504") {
                    println!("Looks like you detected a cycle (malformed 504 response).");
                } else {
                    println!("Request failed: {message}");
                    report.fail(format!(
                        "expected a gateway-timeout outcome for the proxy cycle, \
                         got a transport failure: {message}"
                    ));
                }
            }
            other => {
                println!("Found result:");
                println!("{}", other.render(BodyMode::Full));
                report.fail(format!(
                    "expected a gateway-timeout outcome for the proxy cycle, got: {}",
                    other.render(BodyMode::Silent)
                ));
            }
        }
    }
}
