//! Harness configuration parsing, validation, and path derivation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{HarnessError, Result};

/// Origin-server endpoints the scenarios exercise through the proxy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EndpointConfig {
    /// Test origin server reachable only through the proxy under test.
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// Origin host that appears on the proxy's block list.
    #[serde(default = "default_blocked_host")]
    pub blocked_host: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            blocked_host: default_blocked_host(),
        }
    }
}

fn default_server_host() -> String {
    "http://proxy-test.example.com".into()
}

fn default_blocked_host() -> String {
    "http://blocked.proxy-test.example.com".into()
}

/// Timing knobs for chain start-up and the concurrency scenarios.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimingConfig {
    /// Settle interval after spawning the chain; proxy start-up on a remote
    /// or freshly forked process is not synchronously observable.
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    /// Per-request timeout. Bounds the cycle-detection scenario so a proxy
    /// that loops forever still produces a reportable outcome.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Number of parallel tasks launched by the concurrency-bound scenario.
    #[serde(default = "default_concurrent_tasks")]
    pub concurrent_tasks: usize,
    /// Seconds the concurrency-bound scenario holds before checking that no
    /// parallel task has completed.
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_seconds: default_settle_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            concurrent_tasks: default_concurrent_tasks(),
            hold_seconds: default_hold_seconds(),
        }
    }
}

fn default_settle_seconds() -> u64 {
    5
}

fn default_request_timeout_seconds() -> u64 {
    45
}

fn default_concurrent_tasks() -> usize {
    15
}

fn default_hold_seconds() -> u64 {
    8
}

/// Remote farm settings consumed by the `proxy-farm` binary.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FarmConfig {
    /// Hosts the chained proxy instances run on, in chain order.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Proxy command executed on each host.
    #[serde(default = "default_command")]
    pub command: String,
    /// Working directory on the remote host, if different from the login dir.
    #[serde(default)]
    pub remote_dir: Option<String>,
    /// Port every chained instance listens on.
    #[serde(default = "default_farm_port")]
    pub port: u16,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            command: default_command(),
            remote_dir: None,
            port: default_farm_port(),
        }
    }
}

fn default_command() -> String {
    "./proxy".into()
}

fn default_farm_port() -> u16 {
    1653
}

/// Global harness configuration parsed from `harness.toml`.
///
/// Every field has a default, so running without a config file is supported.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Origin endpoints exercised by the scenarios.
    #[serde(default)]
    pub endpoints: EndpointConfig,
    /// Timing knobs.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Remote farm settings.
    #[serde(default)]
    pub farm: FarmConfig,
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| HarnessError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Settle interval as a [`Duration`].
    #[must_use]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.timing.settle_seconds)
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.request_timeout_seconds)
    }

    /// Hold interval for the concurrency-bound scenario.
    #[must_use]
    pub fn hold_interval(&self) -> Duration {
        Duration::from_secs(self.timing.hold_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.timing.concurrent_tasks == 0 {
            return Err(HarnessError::Config(
                "timing.concurrent_tasks must be greater than zero".into(),
            ));
        }
        if self.timing.request_timeout_seconds == 0 {
            return Err(HarnessError::Config(
                "timing.request_timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.endpoints.server_host.is_empty() {
            return Err(HarnessError::Config(
                "endpoints.server_host must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Per-run proxy cache/state directory, derived from the machine identity.
///
/// The proxy under test writes its cache here; the harness removes it before
/// and after every run so stale entries cannot leak between runs.
#[must_use]
pub fn cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(format!(".proxy-cache-{}", hostname()))
}

#[cfg(unix)]
fn hostname() -> String {
    nix::unistd::gethostname()
        .map_or_else(|_| "localhost".into(), |name| name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".into())
}
