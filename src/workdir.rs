//! Per-test working-directory management.
//!
//! Each test owns one directory for its whole lifetime: the agent
//! process runs rooted there, the file monitor watches it, and the
//! shared log file lives at its top level. The log is append-only and
//! line-oriented; both the monitor thread and the session teardown write
//! to it with one flush per line, so interleaving is bounded to line
//! granularity.
//!
//! All log writes are best-effort: observability must never crash the
//! run it is observing.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::result::TestResult;

/// Agent-written progress log, shared with the file monitor. One
/// `tail -f` on this file gives full observability into a running test.
pub const LOG_FILE: &str = ".praxis-test.log";

/// Path prefix identifying plugin-shipped files in read paths.
const PLUGIN_MARKER: &str = "dist/praxis/";

/// Path prefix identifying project-state files in read paths.
const PROJECT_MARKER: &str = ".praxis/";

/// Handle to one test's working directory.
pub struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TestDir { path: path.into() }
    }

    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Append one line to the shared log file and flush immediately.
    /// Write errors are swallowed; a momentarily unwritable log must not
    /// escalate to a test failure.
    pub fn append_log(&self, line: &str) {
        let open = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path());
        if let Ok(mut file) = open {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }

    /// Append the read manifest block: the deduplicated, display-shortened
    /// list of files the agent reported reading. Written once at session
    /// teardown and never recomputed later. No-op when nothing was read.
    pub fn write_read_manifest(&self, result: &TestResult) {
        if result.reads.is_empty() {
            return;
        }
        let mut seen: Vec<String> = Vec::new();
        for read in &result.reads {
            let short = shorten_read_path(read);
            if !seen.contains(&short) {
                seen.push(short);
            }
        }
        self.append_log("");
        self.append_log("[READ-MANIFEST] Files read during test:");
        for short in &seen {
            self.append_log(&format!("[READ-MANIFEST]   {short}"));
        }
        self.append_log(&format!("[READ-MANIFEST] Total: {} unique files", seen.len()));
    }

    /// Initialize an isolated git root with one empty baseline commit,
    /// so branch-relative checks run by validators have a defined
    /// ancestor.
    pub fn git_baseline(&self) -> Result<()> {
        run_git(&self.path, &["init"])?;
        // Inline identity: test directories must commit even on machines
        // with no global git config.
        run_git(
            &self.path,
            &[
                "-c",
                "user.email=harness@praxis.dev",
                "-c",
                "user.name=workflow-harness",
                "commit",
                "--allow-empty",
                "-m",
                "initial",
            ],
        )?;
        Ok(())
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("run git {args:?} in {}", dir.display()))?;
    if !output.status.success() {
        anyhow::bail!(
            "git {args:?} failed in {}: {}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Shorten a read file path for display.
///
/// Paths under the plugin distribution become `[plugin] <suffix>`;
/// paths under the project state directory become `[project] <marker...>`;
/// anything else is returned unchanged.
pub fn shorten_read_path(path: &str) -> String {
    if let Some(idx) = path.find(PLUGIN_MARKER) {
        return format!("[plugin] {}", &path[idx + PLUGIN_MARKER.len()..]);
    }
    if let Some(idx) = path.find(PROJECT_MARKER) {
        return format!("[project] {}", &path[idx..]);
    }
    path.to_string()
}

/// Write `contents` to `target` atomically by writing to a temp file in
/// the same directory and then renaming. This prevents readers from
/// observing a partially-written file.
pub fn write_atomic(dir: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;

    tmp.write_all(contents)
        .with_context(|| format!("write temp file for {}", target.display()))?;

    // Persist moves the temp file to the target path atomically.
    tmp.persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("rename temp file to {}", target.display()))?;

    Ok(())
}
