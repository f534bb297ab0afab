//! Request outcomes and their console rendering.

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// How a rendered outcome presents its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Print the body verbatim (lossily decoded).
    Full,
    /// Print a SHA-256 digest instead; used for large or binary bodies.
    Hash,
    /// Print the status line only.
    Silent,
}

/// Result of one request issued through the proxy under test.
///
/// Immutable once produced. Transport failures are carried here as data, not
/// raised as errors; the scenario decides what a failure means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The peer answered with a parseable HTTP response.
    Success {
        /// HTTP status code.
        status: u16,
        /// Full response body.
        body: Bytes,
    },
    /// The request never produced a parseable response.
    Failure {
        /// Transport-level error description.
        message: String,
    },
}

impl RequestOutcome {
    /// Whether the outcome is a 200 response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { status: 200, .. })
    }

    /// Status code, if a response was parsed at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::Failure { .. } => None,
        }
    }

    /// Whether a successful body contains the given marker text.
    #[must_use]
    pub fn body_contains(&self, marker: &str) -> bool {
        match self {
            Self::Success { body, .. } => String::from_utf8_lossy(body).contains(marker),
            Self::Failure { .. } => false,
        }
    }

    /// Render the outcome for the console report.
    #[must_use]
    pub fn render(&self, mode: BodyMode) -> String {
        match self {
            Self::Success { status, body } => match mode {
                BodyMode::Full => format!(
                    "Status: {status}\nBody:\n{}\n",
                    String::from_utf8_lossy(body)
                ),
                BodyMode::Hash => {
                    format!("Status: {status}\nBody hash: {}\n", sha256_hex(body))
                }
                BodyMode::Silent => format!("Status: {status}"),
            },
            Self::Failure { message } => format!("Request failed: {message}"),
        }
    }
}

/// Compute the SHA-256 hex digest of the given bytes.
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
