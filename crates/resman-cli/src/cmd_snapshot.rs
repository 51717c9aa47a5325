use crate::workspace::Workspace;
use anyhow::Context;
use resman_chat::{ModelClient, ModelRequest, OpenAiClient};
use resman_ledger::archive::format_for_summary;
use resman_store::{Settings, WorkspaceLock};
use serde_json::json;
use std::path::Path;

const SUMMARY_PROMPT: &str = "Summarize this research conversation as markdown. \
Cover the goals, the papers found (with identifiers), the conclusions reached, \
and the open questions. Do not invent details.\n\nCONVERSATION:\n";

pub fn snapshot(cwd: &Path, label: &str) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let _lock = WorkspaceLock::acquire(&ws.paths, "snapshot")?;
    let info = ws.archive.snapshot(&ws.log, label)?;
    println!("Snapshot of {} records: {}", info.count, info.path.display());
    Ok(())
}

pub fn list(cwd: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let files = ws.archive.list()?;
    if files.is_empty() {
        println!("Archive is empty.");
    }
    for f in files {
        println!("{}", f.display());
    }
    Ok(())
}

pub struct SummaryParams<'a> {
    pub repo_root: &'a Path,
    pub from: Option<&'a Path>,
    pub llm: bool,
    pub label: &'a str,
    pub max_chars: usize,
}

/// Transcript markdown written when no summary text is supplied.
pub fn transcript_markdown(transcript: &str) -> String {
    format!("# Conversation transcript\n\n{transcript}\n")
}

pub fn summary(params: &SummaryParams<'_>) -> anyhow::Result<()> {
    let ws = Workspace::open(params.repo_root)?;
    let markdown = match params.from {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let entries = ws.log.read_all()?;
            let transcript = format_for_summary(&entries, params.max_chars);
            if transcript.is_empty() {
                anyhow::bail!("The log has no messages to summarize.");
            }
            if params.llm {
                summarize_with_model(&ws, &transcript)?
            } else {
                transcript_markdown(&transcript)
            }
        }
    };
    let _lock = WorkspaceLock::acquire(&ws.paths, "summary")?;
    let path = ws.archive.write_summary(&markdown, params.label)?;
    println!("Summary written: {}", path.display());
    Ok(())
}

fn summarize_with_model(ws: &Workspace, transcript: &str) -> anyhow::Result<String> {
    let settings = Settings::load(&ws.paths)?;
    let client = OpenAiClient::new(settings.require_openai_key()?, settings.model.clone());
    let response = client.respond(&ModelRequest {
        input: vec![json!({"role": "user", "content": format!("{SUMMARY_PROMPT}{transcript}")})],
        ..ModelRequest::default()
    })?;
    if response.output_text.trim().is_empty() {
        anyhow::bail!("The model returned an empty summary.");
    }
    Ok(response.output_text)
}
