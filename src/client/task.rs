//! Parallel request tasks for the concurrency scenarios.

use tokio::task::JoinHandle;

use crate::client::{ProxyClient, RequestOutcome};

/// One in-flight parallel request.
///
/// Wraps a tokio task performing a single request; the owner observes
/// completion only at explicit points ([`ConcurrentTask::is_finished`] after
/// the hold interval, and [`ConcurrentTask::join`]), never by polling busily.
#[derive(Debug)]
pub struct ConcurrentTask {
    url: String,
    handle: JoinHandle<RequestOutcome>,
}

impl ConcurrentTask {
    /// Launch a request to `url` on its own task. The client clone shares
    /// the session cookie store with its parent.
    #[must_use]
    pub fn launch(client: ProxyClient, url: String) -> Self {
        let target = url.clone();
        let handle = tokio::spawn(async move { client.request(&target, &[]).await });
        Self { url, handle }
    }

    /// URL this task is requesting.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the request has already completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the request to complete and hand back `(url, outcome)`.
    /// A panicked task joins as a `Failure` outcome rather than poisoning
    /// the scenario.
    pub async fn join(self) -> (String, RequestOutcome) {
        let outcome = match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => RequestOutcome::Failure {
                message: format!("request task failed: {err}"),
            },
        };
        (self.url, outcome)
    }
}
