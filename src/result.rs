//! Per-test result types shared across the harness.
//!
//! A [`TestResult`] is created empty when a session starts, mutated only
//! by the owning session runner while the agent process runs, and frozen
//! once the driver records it. The reporter derives everything it prints
//! from the recorded results; nothing is recomputed later.

use serde::{Deserialize, Serialize};

/// Final outcome of one workflow test run.
///
/// `Unknown` is the pre-run default. A result that is still `Unknown`
/// after verdict extraction means the session never printed a marker
/// line; the driver and reporter count it as a failure, never a pass.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Unknown,
    Pass,
    Fail,
    Timeout,
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unknown => "UNKNOWN",
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Timeout => "TIMEOUT",
            Verdict::Error => "ERROR",
        }
    }
}

/// Result of a single workflow test.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestResult {
    /// Catalog name of the test (unique within a run).
    pub name: String,
    pub verdict: Verdict,
    /// Wall-clock duration from session start to hand-back.
    pub duration_secs: f64,
    /// Captured output lines in the agent's emission order.
    pub output_lines: Vec<String>,
    /// File paths the agent reported reading, in tool-invocation order.
    /// May contain duplicates; the read manifest deduplicates at teardown.
    pub reads: Vec<String>,
    /// Error detail for TIMEOUT / ERROR verdicts; empty otherwise.
    pub error: String,
}

impl TestResult {
    /// Create an empty result for a test about to run.
    pub fn new(name: impl Into<String>) -> Self {
        TestResult {
            name: name.into(),
            verdict: Verdict::Unknown,
            duration_secs: 0.0,
            output_lines: vec![],
            reads: vec![],
            error: String::new(),
        }
    }

    /// True only for an explicit PASS verdict.
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}
