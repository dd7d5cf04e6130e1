//! Background file-system monitor for long-running tests.
//!
//! Watches one test directory for new files and size changes, logging
//! each delta to the shared test log and echoing it to the console. The
//! baseline snapshot is replaced after every poll, so the monitor
//! reports deltas between polls rather than deltas from the start: a
//! file that grows across two polls yields two log lines.
//!
//! Only actual events are logged; there is no heartbeat noise. All log
//! writes are best-effort and the monitor must never take down the test
//! it observes.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::snapshot::{self, fmt_size};
use crate::workdir::TestDir;

/// Default interval between directory polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Bound on how long `stop` waits for the loop thread to acknowledge.
const STOP_JOIN_WAIT: Duration = Duration::from_secs(3);

/// A running monitor. Construct with [`FileMonitor::start`]; the loop
/// runs until [`FileMonitor::stop`] consumes the handle.
pub struct FileMonitor {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    started: Instant,
    dir: TestDir,
}

impl FileMonitor {
    /// Take the baseline snapshot and launch the polling thread.
    pub fn start(dir: &Path, test_name: &str, interval: Duration) -> FileMonitor {
        let started = Instant::now();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let log_dir = TestDir::new(dir);
        let mut baseline = snapshot::take(dir);
        log_dir.append_log(&format!(
            "[MONITOR] File monitor started ({} initial files)",
            baseline.len()
        ));

        let loop_dir = dir.to_path_buf();
        let name = test_name.to_string();
        thread::spawn(move || {
            let loop_log = TestDir::new(&loop_dir);
            loop {
                // The stop channel doubles as a cancellable timer: a send
                // wakes the wait immediately, a timeout means poll now.
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                let current = snapshot::take(&loop_dir);
                let elapsed = started.elapsed().as_secs_f64();
                let delta = snapshot::diff(&baseline, &current);

                for path in &delta.created {
                    let size = current.get(path).copied().unwrap_or(0);
                    let msg = format!("+{elapsed:.0}s new: {path} ({})", fmt_size(size as i64));
                    loop_log.append_log(&format!("[MONITOR] {msg}"));
                    crate::print_progress(&name, &msg);
                }
                for m in &delta.modified {
                    let growth = m.new_size as i64 - m.old_size as i64;
                    let sign = if growth > 0 { "+" } else { "" };
                    let msg = format!(
                        "+{elapsed:.0}s modified: {} ({} → {}, {sign}{})",
                        m.path,
                        fmt_size(m.old_size as i64),
                        fmt_size(m.new_size as i64),
                        fmt_size(growth),
                    );
                    loop_log.append_log(&format!("[MONITOR] {msg}"));
                    crate::print_progress(&name, &msg);
                }

                baseline = current;
            }
            let _ = done_tx.send(());
        });

        FileMonitor {
            stop_tx,
            done_rx,
            started,
            dir: log_dir,
        }
    }

    /// Signal the loop to exit, wait briefly for it, and log total
    /// runtime. Safe to call when the loop never produced output; never
    /// fails, even if the log is unwritable.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.done_rx.recv_timeout(STOP_JOIN_WAIT).is_err() {
            debug!("monitor thread did not acknowledge stop in time");
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        self.dir
            .append_log(&format!("[MONITOR] File monitor stopped after {elapsed:.0}s"));
    }
}
