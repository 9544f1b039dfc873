//! Process probe for the Functions host.
//!
//! `ProcessProbe::start` launches the host, drains its stdout line by line
//! and resolves once the readiness marker appears. The returned
//! [`RunningFunc`] owns the process until [`RunningFunc::stop`] is called.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted -> Starting -> Ready -> Stopping -> Stopped
//!                   |                   |
//!                   +----> Failed <-----+
//! ```
//!
//! The current state is published on a `watch` channel. The output pumps
//! hold a receiver and stop echoing host output once the state leaves
//! `Ready`, so shutdown noise stays out of the test logs.

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::readiness::{parse_marker, Endpoint};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How long to wait for an exit status after stdout closes during startup.
const EXIT_GRACE: Duration = Duration::from_secs(1);

/// How long to wait for a killed process to be reaped.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of the probed host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Probe created, nothing launched yet.
    NotStarted,
    /// Process launched, waiting for the readiness marker.
    Starting,
    /// Readiness marker seen, endpoint resolved.
    Ready,
    /// Termination requested.
    Stopping,
    /// Process exit observed.
    Stopped,
    /// Startup or shutdown failed.
    Failed,
}

impl ProbeState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: ProbeState) -> bool {
        use ProbeState::*;

        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Ready)
                | (Starting, Failed)
                | (Ready, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }

    /// Whether host output should still be echoed to the logs.
    pub fn echoes_output(self) -> bool {
        matches!(self, ProbeState::Starting | ProbeState::Ready)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProbeState::Stopped | ProbeState::Failed)
    }
}

/// Result of stopping the host.
#[derive(Debug, Clone, Copy)]
pub struct StopOutcome {
    /// Exit status reported by the operating system.
    pub status: ExitStatus,
    /// True when the process ignored SIGTERM and had to be killed.
    pub forced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Terminate,
    Kill,
}

enum StartupEvent {
    Ready(Endpoint),
    OutputClosed,
    Exited(String),
    TimedOut,
}

fn transition(state: &watch::Sender<ProbeState>, next: ProbeState) {
    let current = *state.borrow();

    if current.can_transition_to(next) {
        debug!(target: "func.probe", from = ?current, to = ?next, "State transition");
        state.send_replace(next);
    } else {
        warn!(
            target: "func.probe",
            from = ?current,
            to = ?next,
            "Ignoring invalid state transition"
        );
    }
}

/// Launches the host and waits for it to report readiness.
pub struct ProcessProbe {
    config: ProbeConfig,
    state: watch::Sender<ProbeState>,
}

impl ProcessProbe {
    /// Create a probe in the `NotStarted` state.
    pub fn new(config: ProbeConfig) -> Self {
        let (state, _) = watch::channel(ProbeState::NotStarted);
        Self { config, state }
    }

    /// Probe configuration.
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProbeState {
        *self.state.borrow()
    }

    /// Observe the lifecycle, including states reached after `start` consumes the probe.
    pub fn subscribe(&self) -> watch::Receiver<ProbeState> {
        self.state.subscribe()
    }

    /// Launch the host and wait for the readiness marker.
    ///
    /// Resolves with the running handle the first time
    /// `Now listening on: <address>` appears on stdout.
    ///
    /// # Errors
    ///
    /// - `ProbeError::Spawn` if the executable cannot be launched
    /// - `ProbeError::SetupTimeout` if no marker appears within `ready_timeout`
    /// - `ProbeError::EarlyExit` if the process exits before the marker
    /// - `ProbeError::OutputClosed` if stdout closes before the marker
    ///
    /// The process is killed on every error path.
    #[instrument(skip_all, name = "func.probe.start", fields(command = %self.config.command_line()))]
    pub async fn start(self) -> Result<RunningFunc, ProbeError> {
        let Self { config, state } = self;

        transition(&state, ProbeState::Starting);

        let mut std_command = std::process::Command::new(&config.program);
        std_command
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &config.working_dir {
            std_command.current_dir(dir);
        }

        // Own process group so termination reaches the worker processes the host forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_command.process_group(0);
        }

        let mut command = Command::from(std_command);
        command.kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                transition(&state, ProbeState::Failed);
                return Err(ProbeError::Spawn {
                    program: config.program.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        info!(target: "func.probe", pid = ?pid, "Spawned host process");

        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut pumps = Vec::with_capacity(2);

        let Some(stdout) = child.stdout.take() else {
            transition(&state, ProbeState::Failed);
            kill_and_reap(&mut child, pid).await;
            return Err(ProbeError::MissingPipe { stream: "stdout" });
        };

        pumps.push(tokio::spawn(pump_stdout(
            stdout,
            state.subscribe(),
            config.echo_output,
            ready_tx,
            cancel.clone(),
        )));

        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_stderr(
                stderr,
                state.subscribe(),
                cancel.clone(),
            )));
        }

        let event = tokio::select! {
            biased;
            ready = ready_rx => match ready {
                Ok(endpoint) => StartupEvent::Ready(endpoint),
                Err(_) => StartupEvent::OutputClosed,
            },
            status = child.wait() => StartupEvent::Exited(describe_exit(status)),
            _ = tokio::time::sleep(config.ready_timeout) => StartupEvent::TimedOut,
        };

        let error = match event {
            StartupEvent::Ready(endpoint) => {
                transition(&state, ProbeState::Ready);
                info!(target: "func.probe", pid = ?pid, %endpoint, "Host is ready");

                return Ok(RunningFunc {
                    child,
                    pid,
                    endpoint,
                    state,
                    cancel,
                    pumps,
                    stop_timeout: config.stop_timeout,
                    stopped: false,
                });
            }
            StartupEvent::OutputClosed => {
                // stdout usually closes because the process is exiting
                match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                    Ok(status) => ProbeError::EarlyExit {
                        status: describe_exit(status),
                    },
                    Err(_) => ProbeError::OutputClosed,
                }
            }
            StartupEvent::Exited(status) => ProbeError::EarlyExit { status },
            StartupEvent::TimedOut => ProbeError::SetupTimeout {
                timeout: config.ready_timeout,
            },
        };

        warn!(target: "func.probe", pid = ?pid, error = %error, "Host failed to become ready");

        transition(&state, ProbeState::Failed);
        kill_and_reap(&mut child, pid).await;
        cancel.cancel();
        for pump in pumps {
            pump.abort();
        }

        Err(error)
    }
}

/// Handle to a host process that reported readiness.
///
/// Dropping the handle without calling [`RunningFunc::stop`] kills the
/// process group.
#[derive(Debug)]
pub struct RunningFunc {
    child: Child,
    pid: Option<u32>,
    endpoint: Endpoint,
    state: watch::Sender<ProbeState>,
    cancel: CancellationToken,
    pumps: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
    stopped: bool,
}

impl RunningFunc {
    /// Endpoint announced by the host.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// OS process id of the host.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProbeState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ProbeState> {
        self.state.subscribe()
    }

    /// Terminate the host and wait for it to exit.
    ///
    /// Sends SIGTERM to the process group and waits up to `stop_timeout`.
    /// If the process is still running it is killed with SIGKILL and the
    /// outcome is marked `forced`.
    #[instrument(skip_all, name = "func.probe.stop", fields(pid = ?self.pid))]
    pub async fn stop(mut self) -> Result<StopOutcome, ProbeError> {
        self.stopped = true;
        transition(&self.state, ProbeState::Stopping);

        let result = self.terminate().await;

        self.cancel.cancel();
        for pump in self.pumps.drain(..) {
            if let Err(e) = pump.await {
                debug!(target: "func.probe", error = %e, "Output pump ended abnormally");
            }
        }

        match &result {
            Ok(outcome) => {
                transition(&self.state, ProbeState::Stopped);
                info!(
                    target: "func.probe",
                    status = %outcome.status,
                    forced = outcome.forced,
                    "Host stopped"
                );
            }
            Err(e) => {
                transition(&self.state, ProbeState::Failed);
                warn!(target: "func.probe", error = %e, "Failed to stop host");
            }
        }

        result
    }

    async fn terminate(&mut self) -> Result<StopOutcome, ProbeError> {
        if let Err(e) = send_signal(&mut self.child, self.pid, Signal::Terminate) {
            warn!(target: "func.probe", error = %e, "Failed to send SIGTERM, killing");
            kill_and_reap(&mut self.child, self.pid).await;
            return Err(ProbeError::Stop(e));
        }

        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(status) => Ok(StopOutcome {
                status: status.map_err(ProbeError::Stop)?,
                forced: false,
            }),
            Err(_) => {
                warn!(
                    target: "func.probe",
                    timeout = ?self.stop_timeout,
                    "Host did not exit after SIGTERM, killing"
                );
                send_signal(&mut self.child, self.pid, Signal::Kill).map_err(ProbeError::Stop)?;
                let status = self.child.wait().await.map_err(ProbeError::Stop)?;
                Ok(StopOutcome {
                    status,
                    forced: true,
                })
            }
        }
    }
}

impl Drop for RunningFunc {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }

        warn!(target: "func.probe", pid = ?self.pid, "Host dropped without stop, killing");

        transition(&self.state, ProbeState::Stopping);
        if let Err(e) = send_signal(&mut self.child, self.pid, Signal::Kill) {
            warn!(target: "func.probe", error = %e, "Failed to kill host");
        }
        self.cancel.cancel();
        transition(&self.state, ProbeState::Stopped);
    }
}

fn describe_exit(status: io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("unknown status ({})", e),
    }
}

async fn kill_and_reap(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = send_signal(child, pid, Signal::Kill) {
        warn!(target: "func.probe", error = %e, "Failed to kill host");
    }

    if tokio::time::timeout(KILL_REAP_TIMEOUT, child.wait())
        .await
        .is_err()
    {
        warn!(target: "func.probe", pid = ?pid, "Killed host was not reaped in time");
    }
}

/// Signal the host's process group.
///
/// On `Kill` the leader is also killed directly, even when signalling the
/// group failed.
fn send_signal(child: &mut Child, pid: Option<u32>, signal: Signal) -> io::Result<()> {
    #[cfg(unix)]
    let group = match pid {
        Some(pid) => signal_group(pid, signal),
        None => Ok(()),
    };

    #[cfg(not(unix))]
    let group = {
        let _ = pid;
        Ok(())
    };

    // No SIGTERM off Unix, so both signals kill there.
    if signal == Signal::Kill || cfg!(not(unix)) {
        // leader may already be reaped
        if let Err(e) = child.start_kill() {
            debug!(target: "func.probe", ?signal, error = %e, "start_kill failed");
        }
    }

    group
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
    let signo = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };

    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) takes plain integers; the group id is the one created at spawn.
    let rc = unsafe { libc::kill(-pgid, signo) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // group already gone
        Ok(())
    } else {
        Err(err)
    }
}

async fn pump_stdout<R>(
    stream: R,
    state: watch::Receiver<ProbeState>,
    echo: bool,
    ready_tx: oneshot::Sender<Endpoint>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut ready_tx = Some(ready_tx);

    pump_lines(stream, cancel, |line| {
        if echo && state.borrow().echoes_output() {
            info!(target: "func.output", "{}", line);
        }

        if let Some(endpoint) = parse_marker(line) {
            match ready_tx.take() {
                Some(tx) => {
                    if tx.send(endpoint).is_err() {
                        debug!(target: "func.probe", "Readiness marker arrived after startup gave up");
                    }
                }
                None => {
                    debug!(target: "func.probe", %endpoint, "Ignoring repeated readiness marker");
                }
            }
        }
    })
    .await;
}

async fn pump_stderr<R>(stream: R, state: watch::Receiver<ProbeState>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    pump_lines(stream, cancel, |line| {
        if state.borrow().echoes_output() {
            warn!(target: "func.output", "{}", line);
        }
    })
    .await;
}

/// Read `stream` line by line until EOF or cancellation.
async fn pump_lines<R, F>(stream: R, cancel: CancellationToken, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();

        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => read,
            _ = cancel.cancelled() => break,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                warn!(target: "func.probe", error = %e, "Failed to read host output");
                break;
            }
        }
    }
}
