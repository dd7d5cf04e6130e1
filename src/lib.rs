//! workflow-harness core library.
//!
//! End-to-end test engine for praxis agent workflows: the catalog of
//! test descriptors, the per-test session runner with its file monitor
//! and stream-JSON reader, the batch driver, and the reporter.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod events;
pub mod monitor;
pub mod report;
pub mod result;
pub mod session;
pub mod snapshot;
pub mod timefmt;
pub mod workdir;

/// Print one low-latency progress line to stderr. Used by the file
/// monitor, the marker-echo path of the event reader, and the timeout
/// notice, so everything a user watches live shares one format.
pub fn print_progress(test_name: &str, message: &str) {
    eprintln!("  [{test_name}] {message}");
}
