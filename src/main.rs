use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::EnvFilter;

use workflow_harness::catalog::{self, ALL_CATEGORIES};
use workflow_harness::config::HarnessConfig;
use workflow_harness::driver::{self, Filter, RUN_PREFIX};
use workflow_harness::report;
use workflow_harness::timefmt;

#[derive(Debug, Parser)]
#[command(name = "workflow-harness")]
#[command(about = "End-to-end test harness for praxis agent workflows", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run workflow tests (all by default; narrow with the filters)
    Run {
        /// Run a single test by name
        #[arg(long, conflicts_with_all = ["group", "smoke", "negative"])]
        test: Option<String>,

        /// Run one category (smoke, greenfield, negative)
        #[arg(long, conflicts_with_all = ["smoke", "negative"])]
        group: Option<String>,

        /// Run the smoke subset only
        #[arg(long, conflicts_with = "negative")]
        smoke: bool,

        /// Run the negative subset only
        #[arg(long)]
        negative: bool,

        /// Keep per-test working directories instead of deleting them
        #[arg(long)]
        keep_dirs: bool,

        /// Agent model override (e.g. claude-sonnet-4-5)
        #[arg(long)]
        model: Option<String>,
    },

    /// List available tests without running them
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Default to info unless RUST_LOG is set.
    // Allow -v/-vv to override it in a predictable way.
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Run {
            test,
            group,
            smoke,
            negative,
            keep_dirs,
            model,
        } => run_tests(
            &Filter {
                test: test.as_deref(),
                group: group.as_deref(),
                smoke,
                negative,
            },
            keep_dirs,
            model.as_deref(),
        ),
        Command::List => Ok(list_tests()),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

/// Run the selected tests. Exit code 0 when every selected test passes,
/// 1 when at least one fails, 2 when the filter matches nothing.
fn run_tests(filter: &Filter<'_>, keep_dirs: bool, model: Option<&str>) -> Result<u8> {
    let config = HarnessConfig::load(model)?;

    eprintln!("Praxis Workflow Tests - {}", timefmt::now_rfc3339());
    eprintln!("{}", "=".repeat(60));

    // Crash-recovery cleanup for prior interrupted runs.
    driver::cleanup_orphan_state(RUN_PREFIX);

    let selected = driver::filter_tests(catalog::definitions(), filter);
    if selected.is_empty() {
        eprintln!("No tests matched the filter.");
        return Ok(2);
    }
    eprintln!("Running {} test(s)...", selected.len());

    let results = driver::run_selected(&selected, &config, keep_dirs);
    driver::cleanup_orphan_state(RUN_PREFIX);
    let results = results?;

    report::print_summary(&results);
    let report_path = report::write_report(&results, &selected, &config.reports_root)?;
    eprintln!("\nReport: {}", report_path.display());

    Ok(if results.iter().all(|r| r.passed()) { 0 } else { 1 })
}

/// Print the catalog grouped by category.
fn list_tests() -> u8 {
    let tests = catalog::definitions();
    println!("Available tests:");

    for category in ALL_CATEGORIES {
        println!("\n  [{}]", category.as_str());
        for test in tests.iter().filter(|t| t.category == *category) {
            println!(
                "    {:<25} timeout={}s  turns={}",
                test.name,
                test.timeout.as_secs(),
                test.max_turns
            );
        }
    }

    let categories: Vec<&str> = ALL_CATEGORIES.iter().map(|c| c.as_str()).collect();
    println!("\nCategories: {}", categories.join(", "));
    let total = tests.len();
    let negative = tests
        .iter()
        .filter(|t| t.category == catalog::Category::Negative)
        .count();
    println!(
        "Total: {total} tests ({} positive, {negative} negative)",
        total - negative
    );
    0
}
