use resman_core::canon::ascii_json_line;
use resman_core::entry::json_type_name;
use resman_core::error::{LedgerError, Result};
use resman_core::{LogEntry, Role};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// The append-only conversation log backed by `state/index.jsonl`.
///
/// One JSON object per line, ASCII-escaped, newline-terminated. Append order
/// is conversational order; the log is only ever rewritten whole (pruning)
/// or shortened by one physical line.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Bind to a log file. The file need not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty log file if none exists.
    pub fn ensure_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Every record in append order. A missing file is an empty log;
    /// malformed and non-object lines are skipped.
    pub fn read_all(&self) -> Result<Vec<LogEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_lines(&String::from_utf8_lossy(&bytes)))
    }

    /// Append one record as a single line.
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut line = ascii_json_line(entry)?;
        line.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write per record so a line is never split across writes.
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Append an untyped item. Anything but a JSON object is rejected.
    pub fn append_value(&self, item: Value) -> Result<LogEntry> {
        let entry = match item {
            Value::Object(map) => LogEntry::from_object(map),
            other => {
                return Err(LedgerError::Validation(format!(
                    "item must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        self.append(&entry)?;
        Ok(entry)
    }

    pub fn append_message(&self, role: Role, content: impl Into<String>) -> Result<LogEntry> {
        let entry = LogEntry::message(role, content);
        self.append(&entry)?;
        Ok(entry)
    }

    /// Replace the whole file with `entries`. Not crash-atomic: callers
    /// snapshot first.
    pub fn rewrite_all(&self, entries: &[LogEntry]) -> Result<usize> {
        let body = encode_lines(entries)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, body)?;
        tracing::info!(path = %self.path.display(), count = entries.len(), "rewrote event log");
        Ok(entries.len())
    }

    /// Remove one physical line (1-based). Returns `false`, leaving the file
    /// untouched, when the line does not exist.
    pub fn delete_at(&self, line_number: usize) -> Result<bool> {
        if line_number == 0 {
            return Ok(false);
        }
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let mut lines: Vec<&[u8]> = bytes.split_inclusive(|b| *b == b'\n').collect();
        if line_number > lines.len() {
            return Ok(false);
        }
        lines.remove(line_number - 1);
        fs::write(&self.path, lines.concat())?;
        Ok(true)
    }

    /// The last `n` records (at least one) in append order.
    pub fn recent(&self, n: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.read_all()?;
        let n = n.max(1);
        if entries.len() > n {
            entries.drain(..entries.len() - n);
        }
        Ok(entries)
    }
}

/// Parse newline-delimited records, skipping anything that is not a JSON
/// object.
pub fn parse_lines(content: &str) -> Vec<LogEntry> {
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => out.push(LogEntry::from_object(map)),
            Ok(other) => {
                tracing::debug!(line = i + 1, kind = json_type_name(&other), "skipping non-object record")
            }
            Err(e) => tracing::debug!(line = i + 1, error = %e, "skipping malformed record"),
        }
    }
    out
}

/// Encode records in log format: one ASCII line each, newline-terminated.
pub fn encode_lines(entries: &[LogEntry]) -> Result<String> {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&ascii_json_line(entry)?);
        body.push('\n');
    }
    Ok(body)
}

/// User, assistant, and system messages: the readable transcript.
pub fn chat_messages(entries: &[LogEntry]) -> Vec<(Role, &str)> {
    entries
        .iter()
        .filter_map(|e| match e {
            LogEntry::Message { role, content }
                if matches!(role, Role::User | Role::Assistant | Role::System) =>
            {
                Some((*role, content.as_str()))
            }
            _ => None,
        })
        .collect()
}
