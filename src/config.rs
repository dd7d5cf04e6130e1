//! Harness configuration.
//!
//! Resolution order for each setting:
//!   1. CLI flag (where one exists)
//!   2. Environment variable
//!   3. `harness.toml` in the current directory
//!   4. Built-in default
//!
//! The agent binary is configurable so integration tests can substitute
//! a stub for the real CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment override for the agent binary.
pub const AGENT_ENV: &str = "WORKFLOW_HARNESS_AGENT";

/// Environment override for the reports root directory.
pub const REPORTS_ENV: &str = "WORKFLOW_HARNESS_REPORTS";

/// Optional config file read from the invocation directory.
const CONFIG_FILE: &str = "harness.toml";

/// Deserialized shape of `harness.toml`. Every field is optional; the
/// file itself is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    agent_bin: Option<String>,
    model: Option<String>,
    reports_root: Option<String>,
    plugin_dir: Option<String>,
    poll_interval_secs: Option<u64>,
}

/// Fully resolved harness settings.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Agent CLI executable launched per test.
    pub agent_bin: String,
    /// Model override forwarded to the agent, if any.
    pub model: Option<String>,
    /// Directory where persisted reports land.
    pub reports_root: PathBuf,
    /// Plugin distribution passed to the agent via `--plugin-dir`.
    pub plugin_dir: PathBuf,
    /// Interval between file-monitor polls.
    pub poll_interval: Duration,
}

impl HarnessConfig {
    /// Resolve settings from the flag, the environment, and an optional
    /// `harness.toml` in the current directory.
    pub fn load(model_flag: Option<&str>) -> Result<Self> {
        let file = read_file_config(Path::new(CONFIG_FILE))?;
        Ok(Self::resolve(
            model_flag,
            file,
            std::env::var(AGENT_ENV).ok(),
            std::env::var(REPORTS_ENV).ok(),
        ))
    }

    fn resolve(
        model_flag: Option<&str>,
        file: FileConfig,
        env_agent: Option<String>,
        env_reports: Option<String>,
    ) -> Self {
        let agent_bin = env_agent
            .filter(|v| !v.is_empty())
            .or(file.agent_bin)
            .unwrap_or_else(|| "claude".to_string());
        let model = model_flag
            .map(str::to_string)
            .filter(|v| !v.is_empty())
            .or(file.model);
        let reports_root = env_reports
            .filter(|v| !v.is_empty())
            .or(file.reports_root)
            .unwrap_or_else(|| "reports".to_string());
        let plugin_dir = file
            .plugin_dir
            .unwrap_or_else(|| format!("dist{}praxis", std::path::MAIN_SEPARATOR));
        let poll_interval = file
            .poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::monitor::DEFAULT_POLL_INTERVAL);

        HarnessConfig {
            agent_bin,
            model,
            reports_root: PathBuf::from(reports_root),
            plugin_dir: PathBuf::from(plugin_dir),
            poll_interval,
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
}
