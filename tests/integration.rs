//! Integration tests for the workflow-harness binary.
//!
//! Each test runs the compiled binary and validates the CLI contract:
//! exit codes (0 all passed, 1 any failure, 2 empty filter / usage),
//! the list output, and the on-disk artifacts of a run (test log,
//! read manifest, persisted report). Sessions run against a stub agent
//! script substituted via the WORKFLOW_HARNESS_AGENT environment
//! variable; the real CLI is never required.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Path to the compiled binary.
fn binary() -> PathBuf {
    // Prefer the current exe's directory (works inside cargo test).
    let mut p = std::env::current_exe().expect("current exe");
    p.pop(); // remove test binary name
    // In release mode there's no "deps" subdirectory; try both.
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("workflow-harness");
    if cfg!(windows) {
        p.set_extension("exe");
    }
    p
}

/// Run the binary with `args`, a scratch cwd, and optional agent/report
/// overrides.
fn run_harness(args: &[&str], cwd: &Path, agent: Option<&Path>, reports: Option<&Path>) -> Output {
    let mut cmd = Command::new(binary());
    cmd.args(args).current_dir(cwd);
    if let Some(agent) = agent {
        cmd.env("WORKFLOW_HARNESS_AGENT", agent);
    }
    if let Some(reports) = reports {
        cmd.env("WORKFLOW_HARNESS_REPORTS", reports);
    }
    cmd.output().expect("run binary")
}

#[cfg(unix)]
fn write_stub(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("stub-agent");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Stub that reports success for whichever test invoked it.
#[cfg(unix)]
fn passing_stub(dir: &Path) -> PathBuf {
    write_stub(
        dir,
        r#"echo '{"type":"result","result":"[TEST:any] VERDICT: PASS"}'"#,
    )
}

/// Stub that reports failure for whichever test invoked it.
#[cfg(unix)]
fn failing_stub(dir: &Path) -> PathBuf {
    write_stub(
        dir,
        r#"echo '{"type":"result","result":"[TEST:any] VERDICT: FAIL -- validator found problems"}'"#,
    )
}

// ── list ───────────────────────────────────────────────────────────────────────

#[test]
fn list_prints_catalog_without_running() {
    let tmp = tempfile::tempdir().unwrap();
    let output = run_harness(&["list"], tmp.path(), None, None);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["help", "doctor", "dev", "init-greenfield", "dev-no-settings"] {
        assert!(stdout.contains(name), "missing {name} in list: {stdout}");
    }
    assert!(stdout.contains("[smoke]"));
    assert!(stdout.contains("[negative]"));
    assert!(stdout.contains("Categories: smoke, greenfield, negative"));
    assert!(stdout.contains("timeout="), "list must show timeouts");
}

// ── filtering / exit codes ─────────────────────────────────────────────────────

#[test]
fn empty_filter_exits_with_code_2() {
    let tmp = tempfile::tempdir().unwrap();
    let output = run_harness(
        &["run", "--test", "no-such-test-name"],
        tmp.path(),
        None,
        None,
    );
    assert_eq!(output.status.code(), Some(2), "empty selection must exit 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No tests matched"), "stderr: {stderr}");
}

#[test]
fn invalid_subcommand_exits_with_code_2() {
    let output = Command::new(binary())
        .arg("__no_such_subcommand__")
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn conflicting_filters_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let output = run_harness(
        &["run", "--test", "help", "--smoke"],
        tmp.path(),
        None,
        None,
    );
    assert_eq!(
        output.status.code(),
        Some(2),
        "clap must reject --test combined with --smoke"
    );
}

// ── end-to-end against the stub agent ──────────────────────────────────────────

#[cfg(unix)]
#[test]
fn passing_run_exits_zero_and_writes_report() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    let stub = passing_stub(tmp.path());

    let output = run_harness(
        &["run", "--test", "help"],
        tmp.path(),
        Some(&stub),
        Some(&reports),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");

    assert!(stderr.contains("[1/1] help"), "stderr: {stderr}");
    assert!(stderr.contains("1/1 passed"), "stderr: {stderr}");

    // Exactly one report document per invocation.
    let report_files: Vec<_> = std::fs::read_dir(&reports)
        .expect("reports dir created")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(report_files.len(), 1, "expected one report: {report_files:?}");
    let contents = std::fs::read_to_string(report_files[0].path()).unwrap();
    assert!(contents.contains("| 1 | help | PASS |"), "report: {contents}");
    assert!(contents.contains("**1/1 passed**"), "report: {contents}");
    assert!(
        contents.contains("[TEST:any] VERDICT: PASS"),
        "captured output missing from report: {contents}"
    );
}

#[cfg(unix)]
#[test]
fn failing_run_exits_one_and_records_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    let stub = failing_stub(tmp.path());

    let output = run_harness(
        &["run", "--test", "help"],
        tmp.path(),
        Some(&stub),
        Some(&reports),
    );
    assert_eq!(output.status.code(), Some(1));

    let report_files: Vec<_> = std::fs::read_dir(&reports)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    let contents = std::fs::read_to_string(report_files[0].path()).unwrap();
    assert!(contents.contains("| 1 | help | FAIL |"), "report: {contents}");
}

#[cfg(unix)]
#[test]
fn missing_agent_binary_counts_as_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    let missing = tmp.path().join("not-installed-agent");

    let output = run_harness(
        &["run", "--test", "help"],
        tmp.path(),
        Some(&missing),
        Some(&reports),
    );
    assert_eq!(output.status.code(), Some(1), "launch failure is not a pass");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR"), "stderr: {stderr}");
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}

#[cfg(unix)]
#[test]
fn session_without_verdict_marker_is_a_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    // The stub completes normally but never prints a marker line.
    let stub = write_stub(
        tmp.path(),
        r#"echo '{"type":"result","result":"finished without a conclusion"}'"#,
    );

    let output = run_harness(
        &["run", "--test", "help"],
        tmp.path(),
        Some(&stub),
        Some(&reports),
    );
    assert_eq!(output.status.code(), Some(1), "UNKNOWN must count as failing");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("UNKNOWN") || stderr.contains("unknown"),
        "stderr: {stderr}"
    );
}

#[cfg(unix)]
#[test]
fn smoke_subset_runs_every_smoke_test() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    let stub = passing_stub(tmp.path());

    let output = run_harness(&["run", "--smoke"], tmp.path(), Some(&stub), Some(&reports));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
    assert!(stderr.contains("Running 3 test(s)"), "stderr: {stderr}");
    assert!(stderr.contains("3/3 passed"), "stderr: {stderr}");

    let report_files: Vec<_> = std::fs::read_dir(&reports)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    let contents = std::fs::read_to_string(report_files[0].path()).unwrap();
    for name in ["help", "doctor", "general"] {
        assert!(
            contents.contains(&format!("### {name} - PASS")),
            "missing section for {name}: {contents}"
        );
    }
}

#[cfg(unix)]
#[test]
fn keep_dirs_retains_working_directory_with_log() {
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    // Stub also exercises the read-manifest path before passing.
    let stub = write_stub(
        tmp.path(),
        concat!(
            r#"echo '{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"/x/.praxis/settings.yml"}}]}}'"#,
            "\n",
            r#"echo '{"type":"result","result":"[TEST:any] VERDICT: PASS"}'"#,
        ),
    );

    let output = run_harness(
        &["run", "--test", "doctor", "--keep-dirs"],
        tmp.path(),
        Some(&stub),
        Some(&reports),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");

    let kept_line = stderr
        .lines()
        .find(|l| l.trim_start().starts_with("Kept:"))
        .unwrap_or_else(|| panic!("no Kept: line in stderr: {stderr}"));
    let kept_path = PathBuf::from(kept_line.trim_start().trim_start_matches("Kept:").trim());
    assert!(kept_path.is_dir(), "kept dir missing: {}", kept_path.display());

    // The retained directory holds the fixtures, the log, and the manifest.
    assert!(kept_path.join(".praxis").join("settings.yml").exists());
    let log = std::fs::read_to_string(kept_path.join(".praxis-test.log")).unwrap();
    assert!(log.contains("File monitor started"), "log: {log}");
    assert!(log.contains("[READ-MANIFEST]"), "log: {log}");
    assert!(log.contains("[project] .praxis/settings.yml"), "log: {log}");

    // Scratch cleanup since --keep-dirs opts out of deletion.
    let _ = std::fs::remove_dir_all(&kept_path);
}

#[cfg(unix)]
#[test]
fn slow_but_terminating_agent_is_not_misclassified() {
    // The catalog's shortest timeout is minutes, so the forced-kill path
    // is exercised at the session layer where the bound is configurable;
    // here we pin the complement: a stub that takes a moment but does
    // exit must come back PASS, not TIMEOUT.
    let tmp = tempfile::tempdir().unwrap();
    let reports = tmp.path().join("reports");
    let stub = write_stub(
        tmp.path(),
        concat!(
            "sleep 1\n",
            r#"echo '{"type":"result","result":"[TEST:any] VERDICT: PASS"}'"#,
        ),
    );

    let output = run_harness(
        &["run", "--test", "help"],
        tmp.path(),
        Some(&stub),
        Some(&reports),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
    assert!(!stderr.contains("TIMEOUT"), "stderr: {stderr}");
}
