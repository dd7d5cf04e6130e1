//! Directory-content snapshots and the created/modified differ.
//!
//! A snapshot maps relative file paths to byte sizes, taken at one
//! instant by walking the test directory. The differ is a total pure
//! function over two snapshots: it reports keys that appeared and keys
//! whose size changed. Paths removed between snapshots are intentionally
//! not reported; the monitor communicates growth and creation, not
//! deletion.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

/// Relative path -> byte size, ordered for deterministic iteration.
pub type Snapshot = BTreeMap<String, u64>;

/// Entries to skip while walking: VCS internals, platform litter, and
/// the harness's own log file (the monitor must not report its own
/// writes).
const IGNORE: &[&str] = &[".git", ".DS_Store", crate::workdir::LOG_FILE];

/// One size change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modified {
    pub path: String,
    pub old_size: u64,
    pub new_size: u64,
}

/// Result of diffing two snapshots of the same root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Paths present in `current` but not `previous`, sorted.
    pub created: Vec<String>,
    /// Paths present in both with differing sizes, sorted by path.
    pub modified: Vec<Modified>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty()
    }
}

/// Walk `root` and capture a snapshot.
///
/// A missing root yields an empty snapshot; unreadable entries are
/// skipped. Both cases are normal mid-test (the agent may be creating
/// and replacing files while we walk).
pub fn take(root: &Path) -> Snapshot {
    let mut files = Snapshot::new();
    if !root.exists() {
        return files;
    }
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !IGNORE.contains(&name))
            .unwrap_or(true)
    });
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        files.insert(rel.to_string_lossy().into_owned(), meta.len());
    }
    files
}

/// Compute created and size-changed entries between two snapshots taken
/// against the same root.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> SnapshotDiff {
    let mut out = SnapshotDiff::default();
    for (path, &size) in current {
        match previous.get(path) {
            None => out.created.push(path.clone()),
            Some(&old_size) if old_size != size => out.modified.push(Modified {
                path: path.clone(),
                old_size,
                new_size: size,
            }),
            Some(_) => {}
        }
    }
    out
}

/// Human-readable byte size: values under 1024 in bytes, otherwise in
/// kibibytes to one decimal. Signed so deltas format naturally.
pub fn fmt_size(size: i64) -> String {
    if size.abs() < 1024 {
        format!("{size}B")
    } else {
        format!("{:.1}KB", size as f64 / 1024.0)
    }
}
