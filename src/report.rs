//! Result reporting: the console summary table and the persisted
//! markdown report.
//!
//! Both are derived purely from the collected results plus the original
//! descriptors' expected-read declarations. The report keeps the last
//! 100 output lines per test so failures can be read post-mortem
//! without rerunning anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::catalog::TestDescriptor;
use crate::driver::check_expected_reads;
use crate::result::TestResult;
use crate::timefmt;
use crate::workdir::{shorten_read_path, write_atomic};

/// How many trailing output lines each test keeps in the report.
const OUTPUT_TAIL_LINES: usize = 100;

/// Print the final summary table to stderr: one row per test, then the
/// aggregate pass count and total runtime.
pub fn print_summary(results: &[TestResult]) {
    eprintln!("\n{}", "=".repeat(60));
    eprintln!("RESULTS");
    eprintln!("{}", "=".repeat(60));

    for result in results {
        let icon = if result.passed() {
            "pass".to_string()
        } else {
            result.verdict.as_str().to_lowercase()
        };
        let duration = format!("{:.0}s", result.duration_secs);
        let error = if result.error.is_empty() {
            String::new()
        } else {
            format!(" ({})", result.error)
        };
        eprintln!("  [{icon:>7}] {:<25} {duration:>6}{error}", result.name);
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    let total = results.len();
    let overall = if passed == total {
        "ALL PASSED".to_string()
    } else {
        format!("{} FAILED", total - passed)
    };
    let total_time: f64 = results.iter().map(|r| r.duration_secs).sum();
    eprintln!("\n  {passed}/{total} passed, {overall}, {total_time:.0}s total");
}

/// Write the markdown report for this invocation and return its path.
pub fn write_report(
    results: &[TestResult],
    descriptors: &[TestDescriptor],
    reports_root: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(reports_root)
        .with_context(|| format!("create reports dir {}", reports_root.display()))?;
    let path = reports_root.join(format!("workflow-test-{}.md", timefmt::now_stamp()));

    let contents = render_report(results, descriptors);
    write_atomic(reports_root, &path, contents.as_bytes())?;
    Ok(path)
}

fn render_report(results: &[TestResult], descriptors: &[TestDescriptor]) -> String {
    let mut lines: Vec<String> = vec![
        "# Praxis Workflow Test Report".to_string(),
        String::new(),
        format!("Run: {}", timefmt::now_rfc3339()),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        "| # | Test | Verdict | Duration | Error |".to_string(),
        "|---|------|---------|----------|-------|".to_string(),
    ];
    for (i, result) in results.iter().enumerate() {
        lines.push(format!(
            "| {} | {} | {} | {:.0}s | {} |",
            i + 1,
            result.name,
            result.verdict.as_str(),
            result.duration_secs,
            result.error
        ));
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    lines.push(String::new());
    lines.push(format!("**{passed}/{} passed**", results.len()));
    lines.push(String::new());
    lines.push("## Detailed Output".to_string());
    lines.push(String::new());

    for result in results {
        lines.push(format!(
            "### {} - {} ({:.0}s)",
            result.name,
            result.verdict.as_str(),
            result.duration_secs
        ));
        lines.push(String::new());

        if !result.reads.is_empty() {
            let mut unique_reads: Vec<String> = Vec::new();
            for read in &result.reads {
                let short = shorten_read_path(read);
                if !unique_reads.contains(&short) {
                    unique_reads.push(short);
                }
            }
            lines.push(format!(
                "#### Reference Files Read ({} unique files)",
                unique_reads.len()
            ));
            lines.push(String::new());
            for read in &unique_reads {
                lines.push(format!("- `{read}`"));
            }
            lines.push(String::new());

            let expected = descriptors
                .iter()
                .find(|d| d.name == result.name)
                .map(|d| d.expected_reads)
                .unwrap_or(&[]);
            if !expected.is_empty() {
                let missing = check_expected_reads(result, expected);
                let matched = expected.len() - missing.len();
                lines.push(format!(
                    "#### Expected Reads: {matched}/{} matched",
                    expected.len()
                ));
                if !missing.is_empty() {
                    lines.push(String::new());
                    lines.push("**Missing:**".to_string());
                    for pattern in &missing {
                        lines.push(format!("- `{pattern}`"));
                    }
                }
                lines.push(String::new());
            }
        }

        lines.push("<details><summary>Full output</summary>".to_string());
        lines.push(String::new());
        lines.push("```".to_string());
        let skip = result.output_lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        for line in &result.output_lines[skip..] {
            lines.push(line.clone());
        }
        lines.push("```".to_string());
        lines.push(String::new());
        lines.push("</details>".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}
