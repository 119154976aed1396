use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::snapshot::CountSnapshot;

/// Default file the snapshot log appends to.
pub const DEFAULT_LOG_PATH: &str = "detections.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only sink for count snapshots. Entries are never rewritten or read back.
pub trait SnapshotStore {
    fn append(&mut self, snapshot: &CountSnapshot, taken_at: NaiveDateTime) -> Result<()>;
}

/// Render one log entry: a blank line, a timestamp header, then `"<count> <class>"` lines.
pub fn format_entry(snapshot: &CountSnapshot, taken_at: NaiveDateTime) -> String {
    let mut entry = format!("\n--- {} ---\n", taken_at.format(TIMESTAMP_FORMAT));
    for line in snapshot.lines() {
        entry.push_str(&line);
        entry.push('\n');
    }
    entry
}

/// Current local wall-clock time for entry headers.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub struct TextFileSnapshotStore {
    path: PathBuf,
}

impl TextFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for TextFileSnapshotStore {
    fn append(&mut self, snapshot: &CountSnapshot, taken_at: NaiveDateTime) -> Result<()> {
        let entry = format_entry(snapshot, taken_at);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| anyhow!("failed to open snapshot log {}: {}", self.path.display(), e))?;
        file.write_all(entry.as_bytes())
            .map_err(|e| anyhow!("failed to write snapshot log {}: {}", self.path.display(), e))?;
        log::info!(
            "saved {} classes to {}",
            snapshot.counts.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySnapshotStore {
    entries: Vec<String>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn append(&mut self, snapshot: &CountSnapshot, taken_at: NaiveDateTime) -> Result<()> {
        self.entries.push(format_entry(snapshot, taken_at));
        Ok(())
    }
}
