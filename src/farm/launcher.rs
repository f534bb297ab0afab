//! Chain construction: wiring N proxy instances so each forwards downstream.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::farm::supervisor::{LaunchSpec, Supervisor, SupervisorHandle};
use crate::{HarnessError, Result};

/// Grace period for shutdown diagnostics between the interrupt forward and
/// the hard teardown of a still-running chain.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// One link in a proxy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHost {
    /// Host the instance runs on.
    pub host: String,
    /// Port the instance listens on.
    pub port: u16,
}

impl ChainHost {
    /// Build a link from host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for ChainHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How the chain's forwarding flags are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Link i forwards to link i+1; the last link forwards nowhere.
    Forward,
    /// Exactly two links, each forwarding to the other. Built only for the
    /// cycle-detection scenario.
    Cycle,
}

/// Build the launch descriptors for a chain of local proxy instances.
///
/// # Errors
///
/// Returns `HarnessError::Config` if `hosts` is empty, or if a `Cycle`
/// topology is requested for anything other than exactly two hosts.
pub fn chain_specs(
    program: &str,
    cwd: Option<&PathBuf>,
    hosts: &[ChainHost],
    topology: Topology,
) -> Result<Vec<LaunchSpec>> {
    let downstream = downstream_targets(hosts, topology)?;
    let names = link_names(hosts);

    let specs = hosts
        .iter()
        .zip(names)
        .zip(downstream)
        .map(|((link, name), next)| {
            let mut args = vec!["--port".to_owned(), link.port.to_string()];
            if let Some(next) = next {
                args.push("--proxy-server".to_owned());
                args.push(next.host.clone());
                args.push("--proxy-port".to_owned());
                args.push(next.port.to_string());
            }
            LaunchSpec {
                name,
                program: program.to_owned(),
                args,
                cwd: cwd.cloned(),
            }
        })
        .collect();
    Ok(specs)
}

/// Build launch descriptors that start each chain link on a remote host over
/// ssh. The actual remote process creation is ssh's problem; the supervisor
/// sees an ordinary local child with piped stdio.
///
/// # Errors
///
/// Same contract as [`chain_specs`].
pub fn remote_specs(
    command: &str,
    remote_dir: Option<&str>,
    hosts: &[ChainHost],
    topology: Topology,
) -> Result<Vec<LaunchSpec>> {
    let downstream = downstream_targets(hosts, topology)?;
    let names = link_names(hosts);

    let specs = hosts
        .iter()
        .zip(names)
        .zip(downstream)
        .map(|((link, name), next)| {
            let mut remote = format!("{command} --port {}", link.port);
            if let Some(next) = next {
                remote.push_str(&format!(
                    " --proxy-server {} --proxy-port {}",
                    next.host, next.port
                ));
            }
            let remote = match remote_dir {
                Some(dir) => format!("cd {dir} && {remote}"),
                None => remote,
            };
            // ssh -t allocates a terminal so the remote proxy treats the
            // forwarded ETX byte as a keyboard interrupt.
            LaunchSpec {
                name,
                program: "ssh".to_owned(),
                args: vec!["-t".to_owned(), link.host.clone(), remote],
                cwd: None,
            }
        })
        .collect();
    Ok(specs)
}

/// Downstream target for each link under the given topology.
fn downstream_targets(
    hosts: &[ChainHost],
    topology: Topology,
) -> Result<Vec<Option<&ChainHost>>> {
    if hosts.is_empty() {
        return Err(HarnessError::Config("chain requires at least one host".into()));
    }
    match topology {
        Topology::Forward => Ok((0..hosts.len()).map(|i| hosts.get(i + 1)).collect()),
        Topology::Cycle => {
            if hosts.len() != 2 {
                return Err(HarnessError::Config(format!(
                    "cycle topology requires exactly two hosts, got {}",
                    hosts.len()
                )));
            }
            Ok(vec![Some(&hosts[1]), Some(&hosts[0])])
        }
    }
}

/// Console names for the chain links: the short hostname when that is
/// unambiguous, otherwise `host:port`.
fn link_names(hosts: &[ChainHost]) -> Vec<String> {
    let short: Vec<String> = hosts
        .iter()
        .map(|link| {
            link.host
                .split('.')
                .next()
                .unwrap_or(&link.host)
                .to_owned()
        })
        .collect();
    let unique: HashSet<&String> = short.iter().collect();
    if unique.len() == hosts.len() {
        short
    } else {
        hosts.iter().map(ToString::to_string).collect()
    }
}

/// A running proxy chain: supervision task plus the scenario entry point.
#[derive(Debug)]
pub struct Chain {
    entry: String,
    handle: SupervisorHandle,
    task: JoinHandle<Result<()>>,
}

impl Chain {
    /// Address of the first chain link; the target every scenario hits.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Handle for forwarding interrupts to the chain's children.
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    /// Tear the chain down: forward an interrupt so the children can print
    /// their shutdown diagnostics, then hard-stop whatever remains. Children
    /// are killed when the supervisor drops.
    ///
    /// # Errors
    ///
    /// Surfaces a `HarnessError::SupervisionInvariant` raised by the
    /// supervision loop while the chain was running.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.interrupt().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;

        if self.task.is_finished() {
            // Natural exit; surface whatever the loop returned.
            return match self.task.await {
                Ok(result) => result,
                Err(_) => Ok(()),
            };
        }

        debug!("chain still running after interrupt, aborting supervision task");
        self.task.abort();
        let _ = self.task.await;
        Ok(())
    }
}

/// Launches proxy chains and waits out their settle interval.
#[derive(Debug, Clone)]
pub struct ChainLauncher {
    settle: Duration,
}

impl ChainLauncher {
    /// Build a launcher with the given post-spawn settle interval.
    #[must_use]
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Spawn the chain described by `specs`, start its supervision loop on a
    /// background task, and wait the settle interval before declaring the
    /// chain ready. Proxy start-up is not synchronously observable.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if any chain link fails to start.
    pub async fn launch(&self, specs: &[LaunchSpec], entry: String) -> Result<Chain> {
        let supervisor = Supervisor::spawn(specs)?;
        let handle = supervisor.handle();
        let task = tokio::spawn(supervisor.run());

        info!(%entry, settle = ?self.settle, "chain spawned, settling");
        tokio::time::sleep(self.settle).await;

        Ok(Chain {
            entry,
            handle,
            task,
        })
    }
}
