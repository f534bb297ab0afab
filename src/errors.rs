//! Error types shared across the harness.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Harness error enumeration covering all fatal failure modes.
///
/// Request-level failures are not errors: they travel as
/// [`RequestOutcome::Failure`](crate::client::RequestOutcome) data and end up
/// in the scenario report. Scenario assertion failures are accumulated in a
/// [`Report`](crate::scenario::Report) and never raised.
#[derive(Debug)]
pub enum HarnessError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A child process failed to spawn; the whole farm launch is aborted.
    Spawn(String),
    /// Observed child exit and reap result contradict each other.
    SupervisionInvariant(String),
    /// HTTP client construction failure (proxy address, TLS setup).
    Http(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for HarnessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::SupervisionInvariant(msg) => write!(f, "supervision invariant: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for HarnessError {}

impl From<toml::de::Error> for HarnessError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
