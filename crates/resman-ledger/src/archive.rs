use crate::log::{chat_messages, encode_lines, EventLog};
use resman_core::error::{LedgerError, Result};
use resman_core::LogEntry;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_PREFIX: &str = "index_snapshot_";
pub const SUMMARY_PREFIX: &str = "conversation_";
pub const DEFAULT_SUMMARY_CHARS: usize = 120_000;

/// Result of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub count: usize,
}

/// Directory of timestamped log snapshots and narrative summaries.
/// Files are only ever created, never overwritten or removed.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the log as read to `index_snapshot_<unixtime>_<label>.jsonl`.
    pub fn snapshot(&self, log: &EventLog, label: &str) -> Result<SnapshotInfo> {
        self.snapshot_at(log, label, resman_store::unix_now())
    }

    pub(crate) fn snapshot_at(&self, log: &EventLog, label: &str, ts: i64) -> Result<SnapshotInfo> {
        let entries = log.read_all()?;
        let name = format!("{SNAPSHOT_PREFIX}{ts}_{}.jsonl", sanitize_label(label, "snapshot"));
        let path = self.create_new(&name, encode_lines(&entries)?.as_bytes())?;
        tracing::info!(path = %path.display(), count = entries.len(), "snapshot written");
        Ok(SnapshotInfo {
            path,
            count: entries.len(),
        })
    }

    /// Write `conversation_<unixtime>_<label>.md`.
    pub fn write_summary(&self, markdown: &str, label: &str) -> Result<PathBuf> {
        self.write_summary_at(markdown, label, resman_store::unix_now())
    }

    pub(crate) fn write_summary_at(&self, markdown: &str, label: &str, ts: i64) -> Result<PathBuf> {
        let name = format!("{SUMMARY_PREFIX}{ts}_{}.md", sanitize_label(label, "summary"));
        let path = self.create_new(&name, markdown.as_bytes())?;
        tracing::info!(path = %path.display(), "summary written");
        Ok(path)
    }

    /// Snapshots and summaries, sorted by file name.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in rd {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_snapshot = name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".jsonl");
            let is_summary = name.starts_with(SUMMARY_PREFIX) && name.ends_with(".md");
            if (is_snapshot || is_summary) && entry.file_type()?.is_file() {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    fn create_new(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LedgerError::ArchiveExists(path))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(data)?;
        Ok(path)
    }
}

/// Restrict a label to `[A-Za-z0-9_-]` so it stays a plain file-name
/// fragment. Empty labels fall back to `default`.
pub fn sanitize_label(label: &str, default: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned
    }
}

/// The transcript as `ROLE: content` blocks, keeping only the last
/// `max_chars` characters.
pub fn format_for_summary(entries: &[LogEntry], max_chars: usize) -> String {
    let text = chat_messages(entries)
        .into_iter()
        .map(|(role, content)| format!("{}: {content}", role.as_str().to_uppercase()))
        .collect::<Vec<_>>()
        .join("\n\n");
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    text.chars().skip(total - max_chars).collect()
}
