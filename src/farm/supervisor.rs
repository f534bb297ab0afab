//! Child process supervisor with output multiplexing and in-band interrupt.
//!
//! Spawns a set of child processes with piped stdio and `kill_on_drop(true)`,
//! then relays every line any child writes onto one console, prefixed with
//! the child's name. Interrupts are forwarded as a literal ETX byte on each
//! child's stdin rather than an OS signal, so the child's own interrupt
//! handler runs and can print its shutdown diagnostics.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use crate::{HarnessError, Result};

/// ASCII ETX, what a terminal sends for Ctrl-C.
const ETX: u8 = 0x03;

/// Event channel depth; readers block once the relay loop falls this far behind.
const EVENT_CHANNEL_DEPTH: usize = 256;

/// Quiet period after the last child exits before the final drain gives up
/// on reader tasks that are still flushing their last lines.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Launch descriptor for one supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Human name used to prefix the child's relayed output.
    pub name: String,
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory for the child, if different from the harness's.
    pub cwd: Option<std::path::PathBuf>,
}

impl LaunchSpec {
    /// Build a descriptor with no arguments and no working-directory override.
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }
}

/// One spawned child, owned exclusively by the supervisor.
#[derive(Debug)]
struct ChildHandle {
    pid: u32,
    stdin: ChildStdin,
    child: Child,
}

/// Events fanned in from the per-child reader tasks.
#[derive(Debug)]
enum ChildEvent {
    /// A complete output line from the named child.
    Line { name: String, line: String },
    /// The named child closed its stdout.
    Eof { name: String },
    /// Reading the named child's stdout failed.
    ReadError { name: String, error: String },
}

/// Cloneable handle for requesting an interrupt forward from outside the
/// supervision loop.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    interrupt_tx: mpsc::Sender<()>,
}

impl SupervisorHandle {
    /// Ask the supervisor to write the interrupt byte to every active child.
    ///
    /// Safe to invoke any number of times, including after children have
    /// exited; a request arriving after the loop finished is dropped.
    pub async fn interrupt(&self) {
        let _ = self.interrupt_tx.send(()).await;
    }
}

/// Supervisor owning a set of child processes and their I/O handles.
#[derive(Debug)]
pub struct Supervisor {
    children: HashMap<String, ChildHandle>,
    events: mpsc::Receiver<ChildEvent>,
    interrupt_rx: mpsc::Receiver<()>,
    interrupt_tx: mpsc::Sender<()>,
}

impl Supervisor {
    /// Spawn every child named by `specs`.
    ///
    /// Children get piped stdin/stdout/stderr and `kill_on_drop(true)`, so
    /// dropping the supervisor tears the whole farm down.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if any single spawn fails or two specs
    /// share a name; children already started are killed before returning.
    pub fn spawn(specs: &[LaunchSpec]) -> Result<Self> {
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let (interrupt_tx, interrupt_rx) = mpsc::channel(4);
        let mut children: HashMap<String, ChildHandle> = HashMap::new();

        for spec in specs {
            match spawn_child(spec, &event_tx) {
                Ok(handle) => {
                    if children.insert(spec.name.clone(), handle).is_some() {
                        kill_all(&mut children);
                        return Err(HarnessError::Spawn(format!(
                            "duplicate child name: {}",
                            spec.name
                        )));
                    }
                }
                Err(err) => {
                    kill_all(&mut children);
                    return Err(err);
                }
            }
        }

        info!(count = children.len(), "farm spawned");
        Ok(Self {
            children,
            events,
            interrupt_rx,
            interrupt_tx,
        })
    }

    /// Handle for forwarding interrupts into the running loop.
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            interrupt_tx: self.interrupt_tx.clone(),
        }
    }

    /// Number of children still in the active set.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.children.len()
    }

    /// Run the multiplex loop until every child has left the active set,
    /// relaying each non-empty output line to stdout as `"<name>: <line>"`.
    /// A child leaves the set when it closes its stdout; one that lingers
    /// past that point is reaped in the background.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::SupervisionInvariant` if a read failure is
    /// observed for a child that the reap then reports as still running.
    pub async fn run(self) -> Result<()> {
        self.run_with(|line| println!("{line}")).await
    }

    /// Run the multiplex loop, emitting each relayed line through `emit`.
    ///
    /// Lines from one child are emitted in the order the child wrote them;
    /// the interleaving across children is whatever the multiplex observes.
    ///
    /// # Errors
    ///
    /// Same contract as [`Supervisor::run`].
    pub async fn run_with(mut self, mut emit: impl FnMut(&str)) -> Result<()> {
        while !self.children.is_empty() {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ChildEvent::Line { name, line }) => {
                        let line = line.trim_end();
                        if !line.is_empty() {
                            emit(&format!("{name}: {line}"));
                        }
                    }
                    Some(ChildEvent::Eof { name }) => self.reap_exited(&name),
                    Some(ChildEvent::ReadError { name, error }) => {
                        self.reap_after_read_error(&name, &error)?;
                    }
                    // All reader tasks gone; nothing further can arrive.
                    None => break,
                },
                _ = self.interrupt_rx.recv() => self.forward_interrupt().await,
            }
        }

        // Reader tasks can still be flushing lines written just before the
        // last exit; drain with a bounded grace so nothing a child wrote is
        // lost and a lingering stream cannot hold the loop open.
        loop {
            match tokio::time::timeout(DRAIN_GRACE, self.events.recv()).await {
                Ok(Some(ChildEvent::Line { name, line })) => {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        emit(&format!("{name}: {line}"));
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        debug!("all children exited, supervision loop done");
        Ok(())
    }

    /// Reap a child that closed its stdout. The reap never blocks the
    /// multiplex: a child that lingers after closing its output leaves the
    /// active set immediately and is waited on from a background task, so
    /// the other children's output and interrupts keep flowing.
    fn reap_exited(&mut self, name: &str) {
        let Some(handle) = self.children.remove(name) else {
            return;
        };
        let pid = handle.pid;
        let mut child = handle.child;
        match child.try_wait() {
            Ok(Some(status)) => debug!(name, pid, %status, "child exited"),
            Ok(None) => {
                debug!(name, pid, "child closed stdout but lingers, reaping in background");
                let name = name.to_owned();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => debug!(%name, pid, %status, "lingering child exited"),
                        Err(err) => warn!(%name, pid, %err, "failed to reap lingering child"),
                    }
                });
            }
            Err(err) => warn!(name, pid, %err, "failed to reap exited child"),
        }
    }

    /// Reap a child whose stdout read failed. The failure is taken as exit
    /// detection, so the non-blocking reap must agree; a child that is still
    /// running contradicts the observation and is fatal.
    fn reap_after_read_error(&mut self, name: &str, error: &str) -> Result<()> {
        let Some(handle) = self.children.get_mut(name) else {
            return Ok(());
        };
        match handle.child.try_wait() {
            Ok(Some(status)) => {
                debug!(name, pid = handle.pid, %status, "child reaped after read error");
                self.children.remove(name);
                Ok(())
            }
            Ok(None) => Err(HarnessError::SupervisionInvariant(format!(
                "read from child {name} failed ({error}) but the process is still running"
            ))),
            Err(err) => Err(HarnessError::SupervisionInvariant(format!(
                "read from child {name} failed ({error}) and the reap itself failed: {err}"
            ))),
        }
    }

    /// Write one ETX byte to every still-active child's stdin. Write failures
    /// are expected when a child exits concurrently and are ignored.
    async fn forward_interrupt(&mut self) {
        for (name, handle) in &mut self.children {
            if let Err(err) = handle.stdin.write_all(&[ETX]).await {
                debug!(%name, %err, "interrupt write to exited child ignored");
                continue;
            }
            let _ = handle.stdin.flush().await;
        }
        debug!("interrupt byte forwarded to active children");
    }
}

/// Spawn one child and its stdout/stderr reader tasks.
fn spawn_child(spec: &LaunchSpec, event_tx: &mpsc::Sender<ChildEvent>) -> Result<ChildHandle> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd
        .spawn()
        .map_err(|err| HarnessError::Spawn(format!("failed to spawn {}: {err}", spec.name)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| HarnessError::Spawn(format!("failed to capture {} stdin", spec.name)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HarnessError::Spawn(format!("failed to capture {} stdout", spec.name)))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HarnessError::Spawn(format!("failed to capture {} stderr", spec.name)))?;

    let pid = child.id().unwrap_or(0);
    info!(name = %spec.name, pid, program = %spec.program, "child spawned");

    // Liveness is tracked through the stdout reader only; stderr lines are
    // relayed with the same prefix but its EOF carries no exit information.
    spawn_reader(spec.name.clone(), stdout, event_tx.clone(), true);
    spawn_reader(spec.name.clone(), stderr, event_tx.clone(), false);

    Ok(ChildHandle { pid, stdin, child })
}

/// Read one child stream line by line, fanning each line into the event
/// channel. The reader owning the liveness stream reports EOF and read
/// errors; the other ends silently.
fn spawn_reader(
    name: String,
    stream: impl AsyncRead + Send + Unpin + 'static,
    tx: mpsc::Sender<ChildEvent>,
    tracks_liveness: bool,
) {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(stream, LinesCodec::new());
        while let Some(item) = lines.next().await {
            match item {
                Ok(line) => {
                    let event = ChildEvent::Line {
                        name: name.clone(),
                        line,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    if tracks_liveness {
                        let _ = tx
                            .send(ChildEvent::ReadError {
                                name,
                                error: err.to_string(),
                            })
                            .await;
                    }
                    return;
                }
            }
        }
        if tracks_liveness {
            let _ = tx.send(ChildEvent::Eof { name }).await;
        }
    });
}

/// Best-effort kill of every child in the map, used when a later spawn in
/// the same batch fails.
fn kill_all(children: &mut HashMap<String, ChildHandle>) {
    for (name, handle) in &mut *children {
        if let Err(err) = handle.child.start_kill() {
            warn!(%name, %err, "failed to kill partially-started child");
        }
    }
    children.clear();
}
