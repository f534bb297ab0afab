//! HTTP client routed through the proxy under test.

pub mod outcome;
pub mod task;

pub use outcome::{BodyMode, RequestOutcome};
pub use task::ConcurrentTask;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{HarnessError, Result};

/// Distinguished query appended to the session-acquisition request so its
/// response differs from every later request in the scenario.
const SESSION_QUERY: &str = "/basic-cacheable?printrequests&session";

/// Upper bound on how many raw response bytes [`ProxyClient::raw_first_token`]
/// will buffer before giving up on finding a token.
const RAW_RESPONSE_CAP: usize = 64 * 1024;

/// Client issuing requests against the origin through the configured proxy
/// entry point.
///
/// All requests share one cookie store, so a session cookie acquired via
/// [`ProxyClient::acquire_session`] is attached to every subsequent request
/// by this client or any clone of it. Clones are cheap and thread-safe;
/// after acquisition the session state is only ever read.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    entry: String,
    timeout: Duration,
}

impl ProxyClient {
    /// Build a client whose every request is routed through the proxy at
    /// `entry` (`host:port`), with a per-request timeout bounding even a
    /// proxy that never answers.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Http` if the proxy address is unusable or the
    /// client cannot be constructed.
    pub fn new(entry: &str, timeout: Duration) -> Result<Self> {
        let proxy = reqwest::Proxy::http(format!("http://{entry}"))
            .map_err(|err| HarnessError::Http(format!("invalid proxy entry {entry}: {err}")))?;
        let http = reqwest::Client::builder()
            .proxy(proxy)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|err| HarnessError::Http(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            entry: entry.to_owned(),
            timeout,
        })
    }

    /// Proxy entry point this client targets.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Issue one GET through the proxy, with optional literal `name: value`
    /// header pairs. Transport errors come back as a `Failure` outcome; the
    /// caller decides how to react.
    pub async fn request(&self, url: &str, headers: &[(&str, &str)]) -> RequestOutcome {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url, %err, "request failed in transport");
                return RequestOutcome::Failure {
                    message: flatten_error(&err),
                };
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => RequestOutcome::Success { status, body },
            Err(err) => RequestOutcome::Failure {
                message: format!("failed to read body: {}", flatten_error(&err)),
            },
        }
    }

    /// Acquire the scenario's session cookie via a distinguished request.
    ///
    /// Must complete successfully before any concurrent task starts; after
    /// that the cookie store is read-only and safe to share across tasks.
    pub async fn acquire_session(&self, server_host: &str) -> RequestOutcome {
        self.request(&format!("{server_host}{SESSION_QUERY}"), &[])
            .await
    }

    /// Re-issue a GET for `url` as raw bytes over one TCP connection to the
    /// proxy entry and hand back the first whitespace token of whatever comes
    /// back. Lets a caller classify a response the HTTP transport rejected as
    /// unparseable, such as a bare status line with no protocol preamble.
    /// `None` means no token arrived within the client timeout.
    pub async fn raw_first_token(&self, url: &str) -> Option<String> {
        tokio::time::timeout(self.timeout, raw_fetch(&self.entry, url))
            .await
            .ok()
            .flatten()
    }
}

/// One raw absolute-form GET through the proxy entry, read until the first
/// line, EOF, or the buffer cap, reduced to the response's first whitespace
/// token.
async fn raw_fetch(entry: &str, url: &str) -> Option<String> {
    let mut stream = TcpStream::connect(entry).await.ok()?;
    let host = url
        .strip_prefix("http://")
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default();
    let request = format!("GET {url} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.ok()?;

    let mut response = Vec::new();
    let mut chunk = [0_u8; 1024];
    while response.len() < RAW_RESPONSE_CAP {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                // The token is on the first line; stop as soon as one full
                // line arrives so a peer holding the connection open cannot
                // run out the clock.
                if response.contains(&b'\n') {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&response)
        .split_whitespace()
        .next()
        .map(ToOwned::to_owned)
}

/// Render a reqwest error with its source chain; the top-level error alone
/// is usually just "error sending request".
fn flatten_error(err: &reqwest::Error) -> String {
    use std::error::Error;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
