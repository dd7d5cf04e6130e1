//! Session runner: owns one agent process's full lifecycle.
//!
//! Launches `claude --print` in stream-JSON mode inside the test's
//! working directory, runs the event-stream reader on its own thread,
//! and enforces the wall-clock timeout by waiting on the reader's
//! completion channel. Timeout cancellation is forceful: the agent gets
//! SIGKILL, never a graceful-shutdown signal, and whatever output was
//! read before the kill is preserved in the result.
//!
//! Cleanup is unconditional and ordered the same on every exit path:
//! monitor stop, then read-manifest write, then final reap.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::events::{self, SessionLog};
use crate::monitor::FileMonitor;
use crate::result::{TestResult, Verdict};
use crate::workdir::TestDir;

/// Environment variable the agent CLI uses to detect that it is already
/// running under supervision; removed from the child environment so the
/// spawned session behaves like a fresh user session.
const SUPERVISION_ENV: &str = "CLAUDECODE";

/// Bound on waiting for a child that already closed its output to exit.
const EXIT_GRACE: Duration = Duration::from_secs(10);

/// Bound on waiting for a killed child to actually die.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Extra window given to the reader thread to drain buffered output
/// after a timeout kill.
const DRAIN_GRACE: Duration = Duration::from_secs(3);

/// Everything the runner needs to launch one scripted session.
pub struct SessionRequest<'a> {
    /// Test name; scopes the `[TEST:<name>]` marker.
    pub name: &'a str,
    /// Fully rendered prompt (placeholders already substituted).
    pub prompt: &'a str,
    /// Hard wall-clock deadline for the whole session.
    pub timeout: Duration,
    /// Turn-budget cap forwarded to the agent.
    pub max_turns: u32,
    pub config: &'a HarnessConfig,
}

/// Run one agent session to completion and return its result.
pub fn run(request: &SessionRequest<'_>, work_dir: &Path) -> TestResult {
    let mut result = TestResult::new(request.name);
    let start = Instant::now();

    let monitor = FileMonitor::start(work_dir, request.name, request.config.poll_interval);

    let mut command = build_command(request, work_dir);
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            // Launch failure: no process exists, so no timeout logic and
            // no manifest; stop the monitor and report immediately.
            monitor.stop();
            result.verdict = Verdict::Error;
            result.error = if err.kind() == std::io::ErrorKind::NotFound {
                format!("agent CLI not found: {}", request.config.agent_bin)
            } else {
                format!("failed to launch agent: {err}")
            };
            return result;
        }
    };
    info!(test = request.name, pid = child.id(), "agent session started");

    let log = Arc::new(Mutex::new(SessionLog::default()));
    match supervise(&mut child, &log, request) {
        Ok(Some((verdict, error))) => {
            result.verdict = verdict;
            result.error = error;
        }
        Ok(None) => {}
        Err(err) => {
            kill(&mut child);
            let _ = wait_bounded(&mut child, KILL_WAIT);
            result.verdict = Verdict::Error;
            result.error = err.to_string();
        }
    }

    // Unconditional teardown, identical on every path: monitor stop,
    // then manifest, then final reap.
    monitor.stop();
    {
        let guard = log.lock().unwrap_or_else(|e| e.into_inner());
        result.output_lines = guard.output_lines.clone();
        result.reads = guard.reads.clone();
    }
    TestDir::new(work_dir).write_read_manifest(&result);
    if matches!(child.try_wait(), Ok(None)) {
        kill(&mut child);
        let _ = wait_bounded(&mut child, KILL_WAIT);
    }

    result.duration_secs = start.elapsed().as_secs_f64();

    if result.verdict == Verdict::Unknown {
        result.verdict = parse_verdict(&result.output_lines);
    }

    result
}

/// Watch the reader until the stream ends or the deadline expires.
///
/// Returns `Ok(None)` when the stream ended on its own, and
/// `Ok(Some((verdict, error)))` when the deadline forced a kill. Any
/// unexpected failure maps to an ERROR verdict in the caller.
fn supervise(
    child: &mut Child,
    log: &Arc<Mutex<SessionLog>>,
    request: &SessionRequest<'_>,
) -> Result<Option<(Verdict, String)>> {
    let stdout = child.stdout.take().context("agent stdout pipe missing")?;

    // Stderr carries the CLI's own diagnostics; capture it as plain
    // output lines so post-mortems see both streams.
    if let Some(stderr) = child.stderr.take() {
        let stderr_log = Arc::clone(log);
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                if line.is_empty() {
                    continue;
                }
                if let Ok(mut guard) = stderr_log.lock() {
                    guard.output_lines.push(line);
                }
            }
        });
    }

    // Reader thread plus completion channel: the channel's recv_timeout
    // is the timeout primitive. Joining the thread directly could block
    // forever on a child that never closes its pipe.
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let reader_log = Arc::clone(log);
    let name = request.name.to_string();
    thread::spawn(move || {
        events::read_stream(BufReader::new(stdout), &reader_log, &name);
        let _ = done_tx.send(());
    });

    match done_rx.recv_timeout(request.timeout) {
        Ok(()) => {
            // Stream exhausted; give the process a bounded window to exit.
            if wait_bounded(child, EXIT_GRACE)?.is_none() {
                debug!(test = request.name, "agent still alive after closing output");
            }
            Ok(None)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            kill(child);
            let _ = wait_bounded(child, KILL_WAIT)?;
            let timeout_secs = request.timeout.as_secs();
            crate::print_progress(request.name, &format!("TIMEOUT after {timeout_secs}s"));
            // Short drain window so buffered final text still lands in
            // the result.
            let _ = done_rx.recv_timeout(DRAIN_GRACE);
            Ok(Some((
                Verdict::Timeout,
                format!("killed after {timeout_secs}s"),
            )))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            anyhow::bail!("output reader thread terminated unexpectedly")
        }
    }
}

/// Build the agent invocation: non-interactive print mode, stream-JSON
/// output, plugin distribution, turn cap, optional model override, and
/// the prompt as the final positional argument.
fn build_command(request: &SessionRequest<'_>, work_dir: &Path) -> Command {
    let config = request.config;
    let mut command = Command::new(&config.agent_bin);
    command
        .arg("--print")
        .arg("--dangerously-skip-permissions")
        .arg("--verbose")
        .args(["--output-format", "stream-json"])
        .arg("--plugin-dir")
        .arg(&config.plugin_dir)
        .arg("--max-turns")
        .arg(request.max_turns.to_string());
    if let Some(model) = &config.model {
        command.args(["--model", model]);
    }
    command
        .arg("--")
        .arg(request.prompt)
        .current_dir(work_dir)
        .env_remove(SUPERVISION_ENV)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Forcefully terminate the child. Idempotent: killing an already-dead
/// process must not fail.
#[cfg(unix)]
fn kill(child: &mut Child) {
    let pid = child.id();
    // SAFETY: kill(2) is safe to call with any pid and valid signal number.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: no such process; already gone, which is what we wanted.
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pid, error = %err, "kill failed");
        }
    }
}

#[cfg(not(unix))]
fn kill(child: &mut Child) {
    let _ = child.kill();
}

/// Poll `try_wait` until the child exits or the bound elapses.
fn wait_bounded(child: &mut Child, bound: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + bound;
    loop {
        if let Some(status) = child.try_wait().context("wait for agent process")? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Extract the verdict from captured output.
///
/// Scans in reverse so only the last marker line in the transcript is
/// authoritative: earlier exploratory or quoted mentions of the marker
/// never pre-empt the real conclusion. On that line, PASS is checked
/// before FAIL; a line carrying both substrings therefore resolves to
/// PASS. That tie-break mirrors the behavior validators have come to
/// rely on and is pinned by tests; do not reorder the checks.
pub fn parse_verdict(lines: &[String]) -> Verdict {
    for line in lines.iter().rev() {
        if !line.contains("VERDICT:") {
            continue;
        }
        let upper = line.to_uppercase();
        if upper.contains("PASS") {
            return Verdict::Pass;
        }
        if upper.contains("FAIL") {
            return Verdict::Fail;
        }
        return Verdict::Unknown;
    }
    Verdict::Unknown
}
