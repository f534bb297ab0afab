#![forbid(unsafe_code)]

//! `proxy-harness`: scenario dispatcher binary.
//!
//! Launches a local proxy chain, runs one named scenario against it, prints
//! the pass/fail report, and tears everything down. Exits non-zero on any
//! scenario failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use proxy_harness::cleanup::CacheGuard;
use proxy_harness::client::ProxyClient;
use proxy_harness::config::{self, HarnessConfig};
use proxy_harness::farm::{launcher, ChainHost, ChainLauncher, Topology};
use proxy_harness::scenario::{Scenario, ScenarioRunner};
use proxy_harness::{HarnessError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "proxy-harness", about = "Chained HTTP proxy grading harness", version, long_about = None)]
struct Cli {
    /// Scenario to run.
    #[arg(long, value_enum)]
    scenario: Scenario,

    /// Port the primary proxy listens on.
    #[arg(long, default_value_t = 12345)]
    port: u16,

    /// Port for a second, chained proxy instance. Required for the
    /// chain-cycle-detection scenario.
    #[arg(long)]
    secondary_port: Option<u16>,

    /// Path to the proxy executable under test.
    #[arg(long)]
    proxy: PathBuf,

    /// Working directory for the spawned proxy instances.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "harness run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<bool> {
    let config = match &args.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::default(),
    };

    if args.scenario.wants_cycle() && args.secondary_port.is_none() {
        return Err(HarnessError::Config(
            "the chain-cycle-detection scenario requires --secondary-port".into(),
        ));
    }

    // The cache directory is gone before the chain starts and again when
    // the guard drops, on every exit path.
    let guard = CacheGuard::acquire(config::cache_dir());
    info!(cache_dir = %guard.path().display(), scenario = args.scenario.name(), "harness starting");

    let mut hosts = vec![ChainHost::new("localhost", args.port)];
    if let Some(port) = args.secondary_port {
        hosts.push(ChainHost::new("localhost", port));
    }
    let topology = if args.scenario.wants_cycle() {
        Topology::Cycle
    } else {
        Topology::Forward
    };

    let specs = launcher::chain_specs(
        &args.proxy.to_string_lossy(),
        args.cwd.as_ref(),
        &hosts,
        topology,
    )?;
    let chain = ChainLauncher::new(config.settle_interval())
        .launch(&specs, hosts[0].to_string())
        .await?;

    let client = ProxyClient::new(chain.entry(), config.request_timeout())?;
    let runner = ScenarioRunner::new(client, config.endpoints.clone(), &config.timing);

    // Ctrl-C during the scenario still flows through teardown: the chain is
    // interrupted, children die with the supervisor, and the guard drops.
    let report = tokio::select! {
        report = runner.run(args.scenario) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, tearing down");
            None
        }
    };

    let shutdown = chain.shutdown().await;

    let Some(report) = report else {
        shutdown?;
        return Ok(false);
    };
    report.print_summary();
    shutdown?;
    Ok(report.is_pass())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
