//! Built-in test catalog: descriptors, prompt builders, and per-test
//! setup functions.
//!
//! Every test is standalone: it gets its own working directory, writes
//! its own fixtures, and shares no state with any other test. The
//! catalog is an explicit list of immutable values handed to the driver;
//! there is no process-wide registry.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::workdir::LOG_FILE;

/// Placeholder substituted with the concrete working directory before a
/// prompt (and any embedded validator command) reaches the agent.
pub const TEST_DIR_PLACEHOLDER: &str = "{TEST_DIR}";

/// Grouping tag used by the CLI filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Smoke,
    Greenfield,
    Negative,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Smoke => "smoke",
            Category::Greenfield => "greenfield",
            Category::Negative => "negative",
        }
    }
}

/// All categories, in catalog order. Used by `list` output.
pub const ALL_CATEGORIES: &[Category] = &[Category::Smoke, Category::Greenfield, Category::Negative];

/// Prepares a fresh working directory for one test.
pub type SetupFn = fn(&Path) -> Result<()>;

/// Immutable specification of one workflow test.
pub struct TestDescriptor {
    /// Unique identifier within a run.
    pub name: &'static str,
    pub category: Category,
    /// Hard wall-clock bound for the session.
    pub timeout: Duration,
    /// Turn-budget cap forwarded to the agent.
    pub max_turns: u32,
    pub setup: Option<SetupFn>,
    /// Prompt template; may contain [`TEST_DIR_PLACEHOLDER`].
    pub prompt: String,
    /// Substring patterns expected among the session's read paths.
    pub expected_reads: &'static [&'static str],
}

/// Build a full workflow-test prompt: direct skill invocation, mandatory
/// logging, optional validator block, and the verdict instruction.
pub fn build_prompt(
    test_name: &str,
    skill: &str,
    skill_args: &str,
    validator_cmd: &str,
    extra: &str,
) -> String {
    let invocation = if skill_args.is_empty() {
        format!("Skill(\"{skill}\")")
    } else {
        format!("Skill(\"{skill}\", args=\"{skill_args}\")")
    };

    let validator_block = if validator_cmd.is_empty() {
        String::new()
    } else {
        format!(
            r#"
STEP 4: Run this validator command via Bash:
  {validator_cmd}
  Print the full validator output.
  Log the output to "{LOG_FILE}".
"#
        )
    };

    format!(
        r#"You are an automated test runner. Follow these steps EXACTLY.

LOGGING: Log every step to "{LOG_FILE}" via Bash: echo "[$(date +%H:%M:%S)] <msg>" >> {LOG_FILE}

STEP 1: Log "Starting test {test_name}"

STEP 2: Use the Skill tool: {invocation}
  FOLLOW the skill instructions completely. Do everything the skill asks.
  This may involve spawning sub-agents, creating files, running quality checks, etc.
  Do NOT skip any part of the skill workflow.

STEP 3: After the skill workflow is FULLY complete, log "Skill workflow complete"
  Dump file state to log:
  echo "[$(date +%H:%M:%S)] files:" >> {LOG_FILE} && find .praxis -type f 2>/dev/null | sort >> {LOG_FILE}
{extra}
{validator_block}
STEP 5: Based on the validator output, print EXACTLY one of:
  [TEST:{test_name}] VERDICT: PASS
  [TEST:{test_name}] VERDICT: FAIL
  Use PASS only if the validator shows all checks passed. Otherwise FAIL.
  Log the verdict."#
    )
}

/// Build the simpler smoke-test prompt: invoke the skill, report.
pub fn build_smoke_prompt(test_name: &str, skill: &str) -> String {
    format!(
        r#"You are an automated test runner. Follow these steps EXACTLY.

STEP 1: Print "[TEST:{test_name}] Starting smoke test..."
STEP 2: Use the Skill tool to invoke Skill("{skill}").
STEP 3: If the skill executed without error, print:
  [TEST:{test_name}] VERDICT: PASS
  If it errored, print:
  [TEST:{test_name}] VERDICT: FAIL -- <error message>"#
    )
}

// ---------------------------------------------------------------------------
// Setup functions
// ---------------------------------------------------------------------------

/// Testing overrides appended to the project CLAUDE.md; read by every
/// agent in the session. Keeps long-running workflows bounded and
/// removes interactive questions.
const TEST_OVERRIDES: &str = r#"

---

## Testing Mode -- Automated Workflow Test

This is an automated test run. The following overrides apply:

- Quality review loops: 1 iteration maximum.
- Story creation: 2 stories maximum.
- Sprint planning: 1 sprint only.
- Do NOT ask the user for clarification; make reasonable assumptions.
- Do NOT call AskUserQuestion; auto-select the first option and log it:
  echo "[$(date +%H:%M:%S)] AUTO-ANSWER: <question> -> <selected>" >> .praxis-test.log
- Log every major event (agent start, phase transition, file write,
  quality verdict) to .praxis-test.log in the project root.
"#;

const SETTINGS_YML: &str = r#"project:
  name: TestProject
  type: greenfield
  language: python
  architecture: layered
  test_framework: pytest
  coverage_tool: coverage
  package_manager: pip
"#;

const STORY_YML: &str = r#"id: ST-TEST-001
title: User registration endpoint
status: ready
size: small
acceptance_criteria:
  - POST /register creates a user with hashed password
  - duplicate email returns 409
tasks:
  - implement handler
  - add tests
"#;

fn write(dir: &Path, rel: &str, contents: &str) -> Result<()> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create fixture dir {}", parent.display()))?;
    }
    std::fs::write(&path, contents).with_context(|| format!("write fixture {}", path.display()))
}

/// Initialized project state: `.praxis/` with settings, memory, empty
/// story/design dirs, a small PRD and architecture doc, and the testing
/// overrides in CLAUDE.md.
pub fn setup_greenfield(dir: &Path) -> Result<()> {
    write(dir, ".praxis/settings.yml", SETTINGS_YML)?;
    write(dir, ".praxis/sprints.yml", "sprints: []\n")?;
    write(dir, ".praxis/memory/decisions.yml", "decisions: []\n")?;
    write(dir, ".praxis/memory/lessons.yml", "lessons: []\n")?;
    write(
        dir,
        ".praxis/prd.md",
        "# TestProject PRD\n\nUser authentication: registration, login, logout, password reset.\n",
    )?;
    write(
        dir,
        ".praxis/architecture.md",
        "# Architecture\n\nLayered Flask application with a service layer over SQLAlchemy.\n",
    )?;
    std::fs::create_dir_all(dir.join(".praxis/stories"))?;
    std::fs::create_dir_all(dir.join(".praxis/designs"))?;
    write(dir, "CLAUDE.md", &format!("# TestProject{TEST_OVERRIDES}"))
}

/// Dev-workflow state: greenfield plus one ready story and its design doc.
pub fn setup_dev(dir: &Path) -> Result<()> {
    setup_greenfield(dir)?;
    write(dir, ".praxis/stories/ST-TEST-001.yml", STORY_YML)?;
    write(
        dir,
        ".praxis/designs/TestProject-design.md",
        "# TestProject Design\n\nRegistration flow: handler -> service -> repository.\n",
    )
}

/// Negative fixture: a story exists but settings.yml is deliberately
/// missing, so the dev workflow must refuse to start.
pub fn setup_no_settings(dir: &Path) -> Result<()> {
    write(dir, ".praxis/stories/ST-TEST-001.yml", STORY_YML)
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// The built-in test definitions, in execution order.
pub fn definitions() -> Vec<TestDescriptor> {
    vec![
        // ── smoke ──────────────────────────────────────────────────────
        TestDescriptor {
            name: "help",
            category: Category::Smoke,
            timeout: Duration::from_secs(120),
            max_turns: 5,
            setup: None,
            prompt: build_smoke_prompt("help", "praxis-help"),
            expected_reads: &[],
        },
        TestDescriptor {
            name: "doctor",
            category: Category::Smoke,
            timeout: Duration::from_secs(180),
            max_turns: 15,
            setup: Some(setup_greenfield),
            prompt: build_smoke_prompt("doctor", "praxis-doctor"),
            expected_reads: &[],
        },
        TestDescriptor {
            name: "general",
            category: Category::Smoke,
            timeout: Duration::from_secs(180),
            max_turns: 10,
            setup: Some(setup_greenfield),
            prompt: build_smoke_prompt("general", "praxis-general")
                + "\n\nQuestion: What are the tradeoffs between JWT and session-based authentication?",
            expected_reads: &[],
        },
        // ── greenfield ─────────────────────────────────────────────────
        TestDescriptor {
            name: "init-greenfield",
            category: Category::Greenfield,
            timeout: Duration::from_secs(300),
            max_turns: 15,
            setup: None,
            prompt: build_prompt(
                "init-greenfield",
                "praxis-init",
                "Initialize this project with: name=TestProject, type=greenfield, language=python, architecture=layered, test_framework=pytest, coverage_tool=coverage, package_manager=pip",
                "praxis-validate init {TEST_DIR} TestProject greenfield python",
                "",
            ),
            expected_reads: &[],
        },
        TestDescriptor {
            name: "pm",
            category: Category::Greenfield,
            timeout: Duration::from_secs(900),
            max_turns: 30,
            setup: Some(setup_greenfield),
            prompt: build_prompt(
                "pm",
                "praxis-pm",
                "I want to build a user authentication system with registration, login, logout, and password reset for a Python Flask application",
                "praxis-validate pm {TEST_DIR}",
                "",
            ),
            expected_reads: &[],
        },
        TestDescriptor {
            name: "dev",
            category: Category::Greenfield,
            timeout: Duration::from_secs(1800),
            max_turns: 65,
            setup: Some(setup_dev),
            prompt: build_prompt(
                "dev",
                "praxis-dev",
                "develop story ST-TEST-001",
                "praxis-validate dev {TEST_DIR} ST-TEST-001",
                "",
            ),
            expected_reads: &[
                // Practice documents loaded by the dev workflow phases.
                "praxis-tdd/testing-practices.md",
                "praxis-tdd/coding-practices.md",
                "praxis-tdd/security-practices.md",
                // Quality gate definitions and the severity taxonomy.
                "praxis-quality/",
                "praxis-reference/severity-taxonomy.md",
                // Story and settings, loaded by multiple agents.
                "stories/ST-TEST-001.yml",
                "settings.yml",
            ],
        },
        // ── negative ───────────────────────────────────────────────────
        TestDescriptor {
            name: "dev-no-settings",
            category: Category::Negative,
            timeout: Duration::from_secs(120),
            max_turns: 10,
            setup: Some(setup_no_settings),
            prompt: build_prompt(
                "dev-no-settings",
                "praxis-dev",
                "develop story ST-TEST-001",
                "praxis-validate negative {TEST_DIR} no-handoff ST-TEST-001",
                "",
            ),
            expected_reads: &[],
        },
        TestDescriptor {
            name: "init-already-exists",
            category: Category::Negative,
            timeout: Duration::from_secs(120),
            max_turns: 5,
            setup: Some(setup_greenfield),
            prompt: build_smoke_prompt("init-already-exists", "praxis-init")
                + "\n\nIf the skill reports the project is already initialized, that is the expected outcome. Print:\n  [TEST:init-already-exists] VERDICT: PASS\nIf it proceeds to initialize anyway, print:\n  [TEST:init-already-exists] VERDICT: FAIL",
            expected_reads: &[],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let defs = definitions();
        let names: HashSet<_> = defs.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), defs.len());
    }

    #[test]
    fn every_category_is_represented() {
        let defs = definitions();
        for category in ALL_CATEGORIES {
            assert!(
                defs.iter().any(|t| t.category == *category),
                "no tests in category {}",
                category.as_str()
            );
        }
    }

    #[test]
    fn full_prompt_carries_validator_and_verdict_blocks() {
        let prompt = build_prompt("dev", "praxis-dev", "develop ST-1", "praxis-validate dev {TEST_DIR}", "");
        assert!(prompt.contains("Skill(\"praxis-dev\", args=\"develop ST-1\")"));
        assert!(prompt.contains("STEP 4: Run this validator command"));
        assert!(prompt.contains("praxis-validate dev {TEST_DIR}"));
        assert!(prompt.contains("[TEST:dev] VERDICT: PASS"));
        assert!(prompt.contains("[TEST:dev] VERDICT: FAIL"));
    }

    #[test]
    fn prompt_without_validator_skips_step_4() {
        let prompt = build_prompt("x", "praxis-x", "", "", "");
        assert!(!prompt.contains("STEP 4"));
        assert!(prompt.contains("Skill(\"praxis-x\")"));
    }

    #[test]
    fn smoke_prompt_is_self_contained() {
        let prompt = build_smoke_prompt("help", "praxis-help");
        assert!(prompt.contains("[TEST:help] VERDICT: PASS"));
        assert!(!prompt.contains("validator"));
    }

    #[test]
    fn greenfield_setup_writes_project_state() {
        let tmp = tempfile::tempdir().unwrap();
        setup_greenfield(tmp.path()).unwrap();
        assert!(tmp.path().join(".praxis/settings.yml").exists());
        assert!(tmp.path().join(".praxis/stories").is_dir());
        let claude_md = std::fs::read_to_string(tmp.path().join("CLAUDE.md")).unwrap();
        assert!(claude_md.contains("Automated Workflow Test"));
    }

    #[test]
    fn dev_setup_adds_story_and_design() {
        let tmp = tempfile::tempdir().unwrap();
        setup_dev(tmp.path()).unwrap();
        assert!(tmp.path().join(".praxis/stories/ST-TEST-001.yml").exists());
        assert!(
            tmp.path()
                .join(".praxis/designs/TestProject-design.md")
                .exists()
        );
    }

    #[test]
    fn no_settings_setup_omits_settings() {
        let tmp = tempfile::tempdir().unwrap();
        setup_no_settings(tmp.path()).unwrap();
        assert!(tmp.path().join(".praxis/stories/ST-TEST-001.yml").exists());
        assert!(!tmp.path().join(".praxis/settings.yml").exists());
    }
}
