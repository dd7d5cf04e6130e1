//! Test selection and batch execution.
//!
//! For each selected descriptor the driver materializes a fresh working
//! directory, lays a git baseline, runs the descriptor's setup, renders
//! the prompt, invokes the session runner, and checks declared read
//! expectations. Tests run strictly one at a time; nothing is shared
//! between their directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing::{debug, warn};

use crate::catalog::{Category, TEST_DIR_PLACEHOLDER, TestDescriptor};
use crate::config::HarnessConfig;
use crate::result::{TestResult, Verdict};
use crate::session::{self, SessionRequest};
use crate::workdir::{TestDir, shorten_read_path};

/// Reserved prefix for per-test working directories and for orphaned
/// agent state entries left by interrupted runs.
pub const RUN_PREFIX: &str = "test-";

/// CLI-level test selection. At most one of the fields is normally set;
/// precedence follows field order.
#[derive(Debug, Default)]
pub struct Filter<'a> {
    /// Exact test name.
    pub test: Option<&'a str>,
    /// Category name.
    pub group: Option<&'a str>,
    /// Fixed smoke subset.
    pub smoke: bool,
    /// Fixed negative subset.
    pub negative: bool,
}

/// Apply the filter to the catalog.
pub fn filter_tests(all: Vec<TestDescriptor>, filter: &Filter<'_>) -> Vec<TestDescriptor> {
    if let Some(name) = filter.test {
        return all.into_iter().filter(|t| t.name == name).collect();
    }
    if filter.smoke {
        return all
            .into_iter()
            .filter(|t| t.category == Category::Smoke)
            .collect();
    }
    if filter.negative {
        return all
            .into_iter()
            .filter(|t| t.category == Category::Negative)
            .collect();
    }
    if let Some(group) = filter.group {
        return all
            .into_iter()
            .filter(|t| t.category.as_str() == group)
            .collect();
    }
    all
}

/// Run every selected test, each in its own fresh directory.
///
/// Working directories are deleted as each test completes unless
/// `keep_dirs` is set, in which case their paths are announced and left
/// on disk for inspection.
pub fn run_selected(
    selected: &[TestDescriptor],
    config: &HarnessConfig,
    keep_dirs: bool,
) -> Result<Vec<TestResult>> {
    let mut results = Vec::with_capacity(selected.len());

    for (index, descriptor) in selected.iter().enumerate() {
        let temp = tempfile::Builder::new()
            .prefix(&format!("praxis-{RUN_PREFIX}{}-", descriptor.category.as_str()))
            .tempdir()
            .context("create test working directory")?;
        let work_dir = temp.path().to_path_buf();

        eprintln!("\n{}", "─".repeat(50));
        eprintln!(
            "[{}/{}] {} (timeout: {}s)",
            index + 1,
            selected.len(),
            descriptor.name,
            descriptor.timeout.as_secs()
        );
        eprintln!(
            "  Live log:  tail -f {}",
            TestDir::new(&work_dir).log_path().display()
        );

        results.push(run_one(descriptor, &work_dir, config));

        let result = results.last().context("result just pushed")?;
        eprintln!(
            "  => {} ({:.1}s)",
            result.verdict.as_str(),
            result.duration_secs
        );
        report_reads(descriptor, result);

        if keep_dirs {
            let kept = temp.keep();
            eprintln!("  Kept: {}", kept.display());
        }
    }

    Ok(results)
}

fn run_one(descriptor: &TestDescriptor, work_dir: &Path, config: &HarnessConfig) -> TestResult {
    let dir = TestDir::new(work_dir);
    // Baseline commit so branch-relative checks in validators have a
    // defined ancestor. Best-effort: a broken git toolchain surfaces in
    // the validator output, not as a harness crash.
    if let Err(err) = dir.git_baseline() {
        warn!(test = descriptor.name, error = %err, "git baseline failed");
    }

    if let Some(setup) = descriptor.setup {
        if let Err(err) = setup(work_dir) {
            let mut result = TestResult::new(descriptor.name);
            result.verdict = Verdict::Error;
            result.error = format!("setup failed: {err}");
            return result;
        }
    }

    let prompt = substitute_test_dir(&descriptor.prompt, work_dir);
    let request = SessionRequest {
        name: descriptor.name,
        prompt: &prompt,
        timeout: descriptor.timeout,
        max_turns: descriptor.max_turns,
        config,
    };
    session::run(&request, work_dir)
}

/// Render the directory placeholder into a prompt template.
pub fn substitute_test_dir(prompt: &str, work_dir: &Path) -> String {
    prompt.replace(TEST_DIR_PLACEHOLDER, &work_dir.display().to_string())
}

/// Console summary of read coverage for one finished test.
fn report_reads(descriptor: &TestDescriptor, result: &TestResult) {
    if !descriptor.expected_reads.is_empty() {
        let missing = check_expected_reads(result, descriptor.expected_reads);
        let matched = descriptor.expected_reads.len() - missing.len();
        eprintln!(
            "  Reads: {matched}/{} expected patterns matched",
            descriptor.expected_reads.len()
        );
        for pattern in &missing {
            eprintln!("    MISSING: {pattern}");
        }
    }
    if !result.reads.is_empty() {
        let unique: std::collections::HashSet<String> =
            result.reads.iter().map(|r| shorten_read_path(r)).collect();
        eprintln!("  Files read: {} unique", unique.len());
    }
}

/// Check that every expected pattern is a substring of at least one
/// recorded read path. Returns the unmatched subset (empty = all found).
pub fn check_expected_reads(result: &TestResult, expected: &[&str]) -> Vec<String> {
    expected
        .iter()
        .filter(|pattern| !result.reads.iter().any(|path| path.contains(**pattern)))
        .map(|pattern| pattern.to_string())
        .collect()
}

/// Remove leftover agent process-tree state from prior interrupted runs:
/// any entry under the user-level agent state directories whose name
/// carries the reserved run prefix. Called before and after each batch.
pub fn cleanup_orphan_state(prefix: &str) {
    let Some(base_dirs) = BaseDirs::new() else {
        return;
    };
    let state_root = base_dirs.home_dir().join(".claude");
    cleanup_orphan_state_in(&state_root, prefix);
}

fn cleanup_orphan_state_in(state_root: &Path, prefix: &str) {
    for sub in ["teams", "tasks"] {
        let dir = state_root.join(sub);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let is_match = entry.path().is_dir()
                && name.to_string_lossy().starts_with(prefix);
            if is_match {
                debug!(path = %entry.path().display(), "removing orphaned run state");
                let _ = std::fs::remove_dir_all(entry.path());
            }
        }
    }
}
