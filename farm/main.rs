#![forbid(unsafe_code)]

//! `proxy-farm`: remote proxy farm supervisor binary.
//!
//! Spawns one chained proxy instance per configured host (over ssh),
//! multiplexes their output onto this console with `"<name>: "` prefixes,
//! and supervises them for their lifetime. Ctrl-C is not delivered as a
//! signal: it is forwarded to every child as an in-band ETX byte so each
//! proxy's own interrupt handler can print its shutdown diagnostics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use proxy_harness::config::HarnessConfig;
use proxy_harness::farm::{launcher, ChainHost, Supervisor, Topology};
use proxy_harness::{HarnessError, Result};

#[derive(Debug, Parser)]
#[command(name = "proxy-farm", about = "Remote proxy farm supervisor", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hosts to run chained proxy instances on, in chain order. Overrides
    /// the configured farm host list.
    #[arg(long)]
    host: Vec<String>,

    /// Proxy command to execute on each host. Overrides the configured one.
    #[arg(long)]
    command: Option<String>,

    /// Port every chained instance listens on. Overrides the configured one.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing() {
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
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "farm supervision failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::default(),
    };

    let hosts = if args.host.is_empty() {
        config.farm.hosts.clone()
    } else {
        args.host.clone()
    };
    if hosts.is_empty() {
        return Err(HarnessError::Config(
            "no farm hosts configured; pass --host or set [farm] hosts".into(),
        ));
    }

    let command = args.command.unwrap_or_else(|| config.farm.command.clone());
    let port = args.port.unwrap_or(config.farm.port);
    let links: Vec<ChainHost> = hosts
        .iter()
        .map(|host| ChainHost::new(host.clone(), port))
        .collect();

    let specs = launcher::remote_specs(
        &command,
        config.farm.remote_dir.as_deref(),
        &links,
        Topology::Forward,
    )?;

    let supervisor = Supervisor::spawn(&specs)?;
    let handle = supervisor.handle();
    info!(hosts = hosts.len(), port, "farm running; Ctrl-C is forwarded to the children");

    // Each Ctrl-C becomes one interrupt forward; the supervision loop keeps
    // observing until every child has exited on its own.
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            println!();
            handle.interrupt().await;
        }
    });

    supervisor.run().await
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))
}
