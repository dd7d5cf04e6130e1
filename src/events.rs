//! Stream-JSON event parsing for agent sessions.
//!
//! The agent CLI emits one self-describing JSON record per line when run
//! with `--output-format stream-json`. The reader runs on its own thread
//! because the CLI is known to buffer all stdout until near exit under
//! some configurations; the session's main thread must stay free to
//! enforce the timeout.
//!
//! Parsing is tolerant by contract: a line that does not decode is kept
//! as plain text, and records with an unrecognized `type` are ignored.
//! The reader is a pure producer into the shared [`SessionLog`]; it
//! never decides verdicts or timeouts.

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

/// Name of the file-read tool whose invocations feed the read manifest.
const READ_TOOL: &str = "Read";

/// Output collected from one agent session, shared between the reader
/// threads and the session runner. Kept behind a mutex so a timed-out
/// session can still recover everything read up to the kill point.
#[derive(Debug, Default)]
pub struct SessionLog {
    /// Captured output lines in emission order.
    pub output_lines: Vec<String>,
    /// File paths from Read tool invocations, in invocation order.
    pub reads: Vec<String>,
}

/// Consume the stream line-by-line until it is exhausted, feeding the
/// shared log. Returns when the producing process closes its output.
pub fn read_stream(reader: impl BufRead, log: &Arc<Mutex<SessionLog>>, test_name: &str) {
    for line in reader.lines() {
        let Ok(raw) = line else {
            // Pipe error (e.g. the child was killed mid-write); stop here
            // and let the session runner handle the rest.
            break;
        };
        if raw.is_empty() {
            continue;
        }
        process_line(&raw, log, test_name);
    }
}

/// Decode and classify one line of agent output.
fn process_line(raw: &str, log: &Arc<Mutex<SessionLog>>, test_name: &str) {
    let Ok(event) = serde_json::from_str::<Value>(raw) else {
        // Not JSON; keep as plain text.
        push_output(log, raw.to_string());
        return;
    };

    match event.get("type").and_then(Value::as_str) {
        Some("assistant") => {
            let blocks = event
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_array);
            for block in blocks.into_iter().flatten() {
                process_block(block, log, test_name);
            }
        }
        Some("result") => {
            if let Some(text) = event.get("result").and_then(Value::as_str) {
                for line in text.lines() {
                    push_output(log, line.to_string());
                }
            }
        }
        other => {
            debug!(kind = ?other, "ignoring stream event");
        }
    }
}

/// Handle one content block of an assistant message.
fn process_block(block: &Value, log: &Arc<Mutex<SessionLog>>, test_name: &str) {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => {
            let text = block.get("text").and_then(Value::as_str).unwrap_or("");
            let marker = format!("[TEST:{test_name}]");
            for line in text.lines() {
                // Marker lines are echoed immediately so the console
                // shows progress long before the buffered stream ends.
                if line.contains(&marker) {
                    let stripped = line.rsplit(&marker).next().unwrap_or("").trim();
                    crate::print_progress(test_name, stripped);
                }
                push_output(log, line.to_string());
            }
        }
        Some("tool_use") => {
            if block.get("name").and_then(Value::as_str) == Some(READ_TOOL) {
                let path = block
                    .get("input")
                    .and_then(|i| i.get("file_path"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if !path.is_empty() {
                    if let Ok(mut guard) = log.lock() {
                        guard.reads.push(path.to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

fn push_output(log: &Arc<Mutex<SessionLog>>, line: String) {
    if let Ok(mut guard) = log.lock() {
        guard.output_lines.push(line);
    }
}
