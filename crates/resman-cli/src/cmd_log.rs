use crate::workspace::Workspace;
use clap::Subcommand;
use resman_core::{LogEntry, Role};
use resman_store::WorkspaceLock;
use std::path::Path;

const PREVIEW_CHARS: usize = 100;

#[derive(Subcommand)]
pub enum LogCmd {
    /// Print every record with its line number
    Show {
        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the most recent records
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Delete one line (1-based, as numbered by `log show`)
    Delete { line: usize },
    /// Append a message record
    Append {
        /// user, assistant, system, or developer
        #[arg(long, default_value = "user")]
        role: Role,
        content: String,
    },
}

pub fn run(cmd: LogCmd, cwd: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    match cmd {
        LogCmd::Show { json } => show(&ws, json),
        LogCmd::Recent { limit, json } => recent(&ws, limit, json),
        LogCmd::Delete { line } => delete(&ws, line),
        LogCmd::Append { role, content } => {
            let _lock = WorkspaceLock::acquire(&ws.paths, "log append")?;
            ws.log.append_message(role, content)?;
            println!("appended {role} message");
            Ok(())
        }
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

/// One-line rendering of a record.
pub fn describe(entry: &LogEntry) -> String {
    match entry {
        LogEntry::Message { role, content } => format!("{role}: {}", preview(content)),
        LogEntry::FunctionCall {
            name,
            call_id,
            arguments,
        } => format!("call {name} [{call_id}] {}", preview(arguments)),
        LogEntry::FunctionCallOutput { call_id, output } => {
            format!("output [{call_id}] {}", preview(output))
        }
        LogEntry::Other(map) => format!("other {}", preview(&serde_json::Value::Object(map.clone()).to_string())),
    }
}

/// Numbered rendering of the raw file. Numbers are physical lines, the ones
/// `log delete` takes; unparseable lines are shown, not skipped.
pub fn numbered_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| {
            let shown = match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => describe(&entry),
                Err(_) if line.trim().is_empty() => "(blank)".to_string(),
                Err(_) => format!("(malformed) {}", preview(line)),
            };
            format!("{:>5}  {shown}", i + 1)
        })
        .collect()
}

fn show(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let raw = match std::fs::read(ws.log.path()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if raw.is_empty() {
        println!("Log is empty.");
        return Ok(());
    }
    if json {
        print!("{raw}");
        return Ok(());
    }
    let lines = numbered_lines(&raw);
    for line in &lines {
        println!("{line}");
    }
    println!("\n({} lines)", lines.len());
    Ok(())
}

fn recent(ws: &Workspace, limit: usize, json: bool) -> anyhow::Result<()> {
    let entries = ws.log.recent(limit)?;
    if entries.is_empty() {
        println!("Log is empty.");
        return Ok(());
    }
    for entry in &entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!("{}", describe(entry));
        }
    }
    Ok(())
}

fn delete(ws: &Workspace, line: usize) -> anyhow::Result<()> {
    let _lock = WorkspaceLock::acquire(&ws.paths, "log delete")?;
    if ws.log.delete_at(line)? {
        println!("Deleted line {line}");
    } else {
        println!("No line {line}; log unchanged.");
    }
    Ok(())
}
