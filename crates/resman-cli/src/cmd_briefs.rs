use crate::workspace::Workspace;
use resman_briefs::project_index::write_project_index;
use resman_briefs::{collect_sources, refresh_briefs, BriefFiles, RefreshReport, Summarizer};
use resman_chat::{OpenAiClient, OpenAiSummarizer};
use resman_store::{Settings, WorkspaceLock};
use std::path::Path;

pub fn execute(cwd: &Path, force: bool, no_llm: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let settings = Settings::load(&ws.paths)?;
    let client = match (no_llm, settings.openai_api_key.as_deref()) {
        (false, Some(key)) => Some(OpenAiClient::new(key, settings.model.clone())),
        (false, None) => {
            eprintln!("No OpenAI key configured; using heuristic briefs.");
            None
        }
        (true, _) => None,
    };
    let summarizer = client.as_ref().map(|c| OpenAiSummarizer::new(c));

    let _lock = WorkspaceLock::acquire(&ws.paths, "briefs")?;
    let report = refresh(&ws, summarizer.as_ref().map(|s| s as &dyn Summarizer), force)?;
    let index = write_project_index(&ws.paths)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "Briefs: {} updated, {} unchanged, {} errors",
        report.updated.len(),
        report.skipped.len(),
        report.errors.len()
    );
    for rel in &report.updated {
        println!("  updated  {rel}");
    }
    for err in &report.errors {
        println!("  error    {}: {}", err.rel, err.error);
    }
    println!("Index: {}", index.display());
    Ok(())
}

pub fn refresh(
    ws: &Workspace,
    summarizer: Option<&dyn Summarizer>,
    force: bool,
) -> anyhow::Result<RefreshReport> {
    let sources = collect_sources(&ws.paths.memory_dir)?;
    refresh_briefs(
        &sources,
        &ws.paths.root,
        &BriefFiles::from_paths(&ws.paths),
        summarizer,
        force,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_refresh_then_index() {
        let tmp = tempfile::tempdir().unwrap();
        crate::cmd_init::execute(tmp.path()).unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        std::fs::write(ws.paths.memory_dir.join("atlas.md"), "# Atlas\nOne-liner: retrieval survey\n").unwrap();

        let report = refresh(&ws, None, false).unwrap();
        assert_eq!(report.updated, vec!["memory/atlas.md".to_string()]);
        let again = refresh(&ws, None, false).unwrap();
        assert_eq!(again.skipped, vec!["memory/atlas.md".to_string()]);

        let index = write_project_index(&ws.paths).unwrap();
        let text = std::fs::read_to_string(index).unwrap();
        assert!(text.contains("- **atlas** (memory/atlas.md): retrieval survey"));
    }
}
