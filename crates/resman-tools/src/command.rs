//! The `command` tool: an enumerated set of workspace operations the model
//! may invoke, each with typed arguments.

use crate::claude_code::{self, RunError, RunOptions, RunOutcome};
use crate::context::ToolContext;
use crate::files;
use crate::redact::{is_secret_name, redact_secrets};
use crate::scholar::ScholarClient;
use anyhow::Context;
use resman_briefs::{collect_sources, refresh_briefs, repo_map, BriefFiles, Summarizer};
use resman_core::entry::json_type_name;
use resman_core::{LogEntry, Role, ToolValue};
use resman_ledger::{prune_log, Archive, EventLog, PrunePolicy};
use resman_store::{Settings, StatePaths};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RECENT: usize = 10;
const DEFAULT_PAPER_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AppendMessage {
        role: Role,
        content: String,
    },
    /// Append a raw JSON object as one record.
    AppendItem {
        item: Value,
    },
    ReadEntries,
    RecentEntries {
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Remove one physical line (1-based).
    DeleteLine {
        line: usize,
    },
    /// Replace the whole log. A snapshot is taken first.
    RewriteEntries {
        entries: Vec<Value>,
    },
    Snapshot {
        #[serde(default)]
        label: Option<String>,
    },
    WriteSummary {
        markdown: String,
        #[serde(default)]
        label: Option<String>,
    },
    Prune {
        #[serde(default = "default_policy")]
        policy: PrunePolicy,
        #[serde(default)]
        keep_last: Option<usize>,
    },
    RefreshBriefs {
        #[serde(default)]
        force: bool,
    },
    RepoMap {
        #[serde(default)]
        max_files: Option<usize>,
    },
    SearchPapers {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        year: Option<String>,
    },
    PaperDetails {
        paper_id: String,
    },
    RecommendPapers {
        paper_id: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Read a memo under `memory/`.
    ReadFile {
        path: String,
        #[serde(default)]
        max_chars: Option<usize>,
    },
    /// Create or replace a memo under `memory/`.
    WriteFile {
        path: String,
        content: String,
    },
    ListFiles {
        #[serde(default = "default_memo_dir")]
        dir: String,
        #[serde(default = "default_pattern")]
        pattern: String,
        #[serde(default)]
        max_results: Option<usize>,
    },
    /// Hand a task to the coding-agent CLI.
    RunAgent {
        prompt: String,
        #[serde(default)]
        add_dirs: Vec<String>,
        #[serde(default)]
        timeout_s: Option<u64>,
    },
    SetVar {
        name: String,
        value: Value,
    },
    GetVar {
        name: String,
    },
    GetEnv {
        name: String,
        #[serde(default)]
        default: Option<String>,
    },
}

fn default_policy() -> PrunePolicy {
    PrunePolicy::Messages
}

fn default_memo_dir() -> String {
    "memory".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

impl Command {
    /// Commands that rewrite or remove existing log records rather than
    /// appending to the end.
    pub fn rewrites_log(&self) -> bool {
        matches!(
            self,
            Command::DeleteLine { .. } | Command::RewriteEntries { .. } | Command::Prune { .. }
        )
    }
}

/// Snapshot label taken before a model-requested rewrite.
pub const REWRITE_SNAPSHOT_LABEL: &str = "before_rewrite";

/// Everything a command may touch. Capabilities that are absent (no
/// Scholar key, no summarizer) make the matching commands fail cleanly.
pub struct CommandEnv<'a> {
    pub paths: &'a StatePaths,
    pub log: &'a EventLog,
    pub archive: &'a Archive,
    pub settings: &'a Settings,
    pub scholar: Option<&'a ScholarClient>,
    pub summarizer: Option<&'a dyn Summarizer>,
}

impl CommandEnv<'_> {
    fn scholar(&self) -> anyhow::Result<&ScholarClient> {
        self.scholar
            .context("Semantic Scholar is not configured. Set S2_KEY to enable paper commands.")
    }
}

fn to_tool<T: serde::Serialize>(value: &T) -> anyhow::Result<ToolValue> {
    Ok(ToolValue::from(serde_json::to_value(value)?))
}

fn entries_value(entries: &[LogEntry]) -> ToolValue {
    ToolValue::Seq(
        entries
            .iter()
            .map(|e| ToolValue::from(Value::from(e.clone())))
            .collect(),
    )
}

fn parse_entries(values: Vec<Value>) -> anyhow::Result<Vec<LogEntry>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Value::Object(map) => Ok(LogEntry::from_object(map)),
            other => anyhow::bail!(
                "entries[{i}] must be a JSON object, got {}",
                json_type_name(&other)
            ),
        })
        .collect()
}

/// Run one command against the workspace.
pub fn execute(cmd: Command, env: &CommandEnv<'_>, ctx: &mut ToolContext) -> anyhow::Result<ToolValue> {
    match cmd {
        Command::AppendMessage { role, content } => {
            let entry = env.log.append_message(role, content)?;
            Ok(ToolValue::from(Value::from(entry)))
        }
        Command::AppendItem { item } => {
            let entry = env.log.append_value(item)?;
            Ok(ToolValue::from(Value::from(entry)))
        }
        Command::ReadEntries => Ok(entries_value(&env.log.read_all()?)),
        Command::RecentEntries { limit } => {
            Ok(entries_value(&env.log.recent(limit.unwrap_or(DEFAULT_RECENT))?))
        }
        Command::DeleteLine { line } => {
            let deleted = env.log.delete_at(line)?;
            Ok(ToolValue::map([("deleted", ToolValue::Bool(deleted))]))
        }
        Command::RewriteEntries { entries } => {
            let entries = parse_entries(entries)?;
            let snapshot = env.archive.snapshot(env.log, REWRITE_SNAPSHOT_LABEL)?;
            let written = env.log.rewrite_all(&entries)?;
            Ok(ToolValue::map([
                ("written", ToolValue::from(written)),
                ("snapshot", ToolValue::from(snapshot.path.display().to_string())),
            ]))
        }
        Command::Snapshot { label } => {
            let info = env.archive.snapshot(env.log, label.as_deref().unwrap_or(""))?;
            to_tool(&info)
        }
        Command::WriteSummary { markdown, label } => {
            let path = env
                .archive
                .write_summary(&markdown, label.as_deref().unwrap_or(""))?;
            Ok(ToolValue::map([("path", ToolValue::from(path.display().to_string()))]))
        }
        Command::Prune { policy, keep_last } => {
            let n = keep_last.unwrap_or(env.settings.keep_last);
            let report = prune_log(env.log, env.archive, policy, n)?;
            to_tool(&report)
        }
        Command::RefreshBriefs { force } => {
            let sources = collect_sources(&env.paths.memory_dir)?;
            let report = refresh_briefs(
                &sources,
                &env.paths.root,
                &BriefFiles::from_paths(env.paths),
                env.summarizer,
                force,
            )?;
            to_tool(&report)
        }
        Command::RepoMap { max_files } => {
            let map = repo_map::write_repo_map(
                env.paths,
                max_files.unwrap_or(env.settings.repo_map_max_files),
            )?;
            Ok(ToolValue::map([
                ("count", ToolValue::from(map.files.len())),
                ("truncated", ToolValue::Bool(map.truncated)),
                (
                    "path",
                    ToolValue::from(env.paths.repo_map_json.display().to_string()),
                ),
            ]))
        }
        Command::SearchPapers { query, limit, year } => {
            let out = env.scholar()?.search_papers(
                &query,
                limit.unwrap_or(DEFAULT_PAPER_LIMIT),
                year.as_deref(),
            )?;
            Ok(ToolValue::from(out))
        }
        Command::PaperDetails { paper_id } => {
            Ok(ToolValue::from(env.scholar()?.paper_details(&paper_id)?))
        }
        Command::RecommendPapers { paper_id, limit } => {
            let out = env
                .scholar()?
                .recommend_papers(&paper_id, limit.unwrap_or(DEFAULT_PAPER_LIMIT))?;
            Ok(ToolValue::from(out))
        }
        Command::ReadFile { path, max_chars } => Ok(ToolValue::Text(files::read_file(
            env.paths,
            &path,
            max_chars.unwrap_or(files::DEFAULT_READ_CHARS),
        )?)),
        Command::WriteFile { path, content } => {
            let written = files::write_file(env.paths, &path, &content)?;
            Ok(ToolValue::map([
                ("path", ToolValue::from(written)),
                ("chars", ToolValue::from(content.chars().count())),
            ]))
        }
        Command::ListFiles {
            dir,
            pattern,
            max_results,
        } => {
            let found = files::list_files(
                env.paths,
                &dir,
                &pattern,
                max_results.unwrap_or(files::DEFAULT_LIST_MAX),
            )?;
            Ok(ToolValue::Seq(found.into_iter().map(ToolValue::Text).collect()))
        }
        Command::RunAgent {
            prompt,
            add_dirs,
            timeout_s,
        } => {
            let outcome = run_agent(env, &prompt, add_dirs, timeout_s)?;
            to_tool(&outcome)
        }
        Command::SetVar { name, value } => {
            let previous = ctx.set(name, value).unwrap_or(Value::Null);
            Ok(ToolValue::map([
                ("version", ToolValue::from(ctx.version() as i64)),
                ("previous", ToolValue::from(previous)),
            ]))
        }
        Command::GetVar { name } => Ok(ctx
            .get(&name)
            .cloned()
            .map(ToolValue::from)
            .unwrap_or(ToolValue::Null)),
        Command::GetEnv { name, default } => {
            if is_secret_name(&name) {
                anyhow::bail!("{name} looks like a secret and is not readable through this tool");
            }
            Ok(std::env::var(&name)
                .ok()
                .or(default)
                .map(ToolValue::Text)
                .unwrap_or(ToolValue::Null))
        }
    }
}

fn run_agent(
    env: &CommandEnv<'_>,
    prompt: &str,
    add_dirs: Vec<String>,
    timeout_s: Option<u64>,
) -> anyhow::Result<RunOutcome> {
    let opts = RunOptions {
        bin: env.settings.claude_bin.as_ref().map(PathBuf::from),
        cwd: Some(env.paths.root.clone()),
        add_dirs: add_dirs.into_iter().map(PathBuf::from).collect(),
        timeout: Duration::from_secs(timeout_s.unwrap_or(env.settings.claude_timeout_s)),
        log_path: Some(
            env.paths
                .logs_dir
                .join(format!("agent_{}.log", resman_store::unix_now())),
        ),
        ..RunOptions::default()
    };
    match claude_code::run_stream(prompt, &opts) {
        Ok(mut outcome) => {
            outcome.stdout = redact_secrets(&outcome.stdout);
            outcome.stderr = redact_secrets(&outcome.stderr);
            Ok(outcome)
        }
        Err(e @ RunError::NotFound(_)) => Ok(RunOutcome {
            ok: false,
            returncode: None,
            stdout: String::new(),
            stderr: e.to_string(),
            cmd: Vec::new(),
            cwd: opts.cwd,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Parse tool arguments into a command. The error is the `{ok: false}`
/// answer to send back.
pub fn parse(args: &Value) -> Result<Command, Value> {
    Command::deserialize(args)
        .map_err(|e| json!({"ok": false, "error": format!("invalid command: {e}")}))
}

/// Wrap a command result as `{ok, result}` or `{ok: false, error}`.
pub fn answer(result: anyhow::Result<ToolValue>) -> Value {
    match result {
        Ok(result) => json!({"ok": true, "result": result.into_json()}),
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            json!({"ok": false, "error": redact_secrets(&format!("{e:#}"))})
        }
    }
}

/// Parse and run a command. Never fails: every problem becomes an error
/// value.
pub fn dispatch(args: &Value, env: &CommandEnv<'_>, ctx: &mut ToolContext) -> Value {
    match parse(args) {
        Ok(cmd) => answer(execute(cmd, env, ctx)),
        Err(refusal) => refusal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    struct Fixture {
        _tmp: tempfile::TempDir,
        paths: StatePaths,
        log: EventLog,
        archive: Archive,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let paths = StatePaths::discover(tmp.path());
            paths.ensure_layout().unwrap();
            let log = EventLog::open(paths.index_jsonl.clone());
            let archive = Archive::new(paths.memory_dir.clone());
            let settings = Settings::from_sources(&Map::new(), |_| None).unwrap();
            Self {
                _tmp: tmp,
                paths,
                log,
                archive,
                settings,
            }
        }

        fn env(&self) -> CommandEnv<'_> {
            CommandEnv {
                paths: &self.paths,
                log: &self.log,
                archive: &self.archive,
                settings: &self.settings,
                scholar: None,
                summarizer: None,
            }
        }
    }

    #[test]
    fn append_and_read_back() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        let out = dispatch(
            &json!({"command": "append_message", "role": "user", "content": "hello"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["ok"], true);
        let out = dispatch(&json!({"command": "read_entries"}), &fx.env(), &mut ctx);
        assert_eq!(out["result"], json!([{"role": "user", "content": "hello"}]));
    }

    #[test]
    fn append_item_rejects_non_objects() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        let out = dispatch(
            &json!({"command": "append_item", "item": [1, 2]}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["ok"], false);
        assert!(fx.log.read_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_command_is_an_error_value() {
        let fx = Fixture::new();
        let out = dispatch(
            &json!({"command": "exec", "code": "rm -rf /"}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["ok"], false);
        assert!(out["error"].as_str().unwrap().starts_with("invalid command"));
    }

    #[test]
    fn only_rewriting_commands_are_flagged() {
        let flagged = |v: Value| parse(&v).unwrap().rewrites_log();
        assert!(flagged(json!({"command": "prune"})));
        assert!(flagged(json!({"command": "delete_line", "line": 1})));
        assert!(flagged(json!({"command": "rewrite_entries", "entries": []})));
        assert!(!flagged(json!({"command": "append_message", "role": "user", "content": "x"})));
        assert!(!flagged(json!({"command": "snapshot"})));
    }

    #[test]
    fn delete_out_of_range_reports_false() {
        let fx = Fixture::new();
        fx.log.append_message(Role::User, "a").unwrap();
        let out = dispatch(
            &json!({"command": "delete_line", "line": 9}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["result"]["deleted"], false);
        assert_eq!(fx.log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn rewrite_snapshots_first() {
        let fx = Fixture::new();
        fx.log.append_message(Role::User, "old").unwrap();
        let out = dispatch(
            &json!({"command": "rewrite_entries", "entries": [{"role": "assistant", "content": "new"}]}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["ok"], true);
        assert_eq!(out["result"]["written"], 1);
        let snap = out["result"]["snapshot"].as_str().unwrap();
        assert!(snap.ends_with("_before_rewrite.jsonl"));
        assert!(std::fs::read_to_string(snap).unwrap().contains("old"));
        assert_eq!(
            fx.log.read_all().unwrap(),
            vec![LogEntry::message(Role::Assistant, "new")]
        );
    }

    #[test]
    fn rewrite_with_bad_entry_leaves_log_alone() {
        let fx = Fixture::new();
        fx.log.append_message(Role::User, "keep").unwrap();
        let out = dispatch(
            &json!({"command": "rewrite_entries", "entries": [{"role": "user", "content": "x"}, 7]}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["ok"], false);
        assert!(out["error"].as_str().unwrap().contains("entries[1]"));
        assert_eq!(fx.log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn prune_uses_configured_default() {
        let fx = Fixture::new();
        for i in 0..60 {
            fx.log.append_message(Role::User, format!("m{i}")).unwrap();
        }
        let out = dispatch(&json!({"command": "prune"}), &fx.env(), &mut ToolContext::new());
        assert_eq!(out["ok"], true);
        assert_eq!(out["result"]["kept"], 50);
        assert_eq!(out["result"]["policy"], "messages");
        assert_eq!(fx.log.read_all().unwrap().len(), 50);
    }

    #[test]
    fn refresh_briefs_without_summarizer_uses_heuristic() {
        let fx = Fixture::new();
        std::fs::write(fx.paths.memory_dir.join("atlas.md"), "# Atlas\nA memo\n").unwrap();
        let out = dispatch(
            &json!({"command": "refresh_briefs"}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["result"]["updated"], json!(["memory/atlas.md"]));
    }

    #[test]
    fn memo_files_round_trip() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        let out = dispatch(
            &json!({"command": "write_file", "path": "memory/atlas.md", "content": "# Atlas\nsparse\n"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["result"]["path"], "memory/atlas.md");
        let out = dispatch(
            &json!({"command": "read_file", "path": "memory/atlas.md"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["result"], "# Atlas\nsparse\n");
        let out = dispatch(
            &json!({"command": "list_files", "pattern": "*.md"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["result"], json!(["memory/atlas.md"]));
    }

    #[test]
    fn memo_files_refuse_traversal() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        for args in [
            json!({"command": "read_file", "path": "memory/../state/index.jsonl"}),
            json!({"command": "write_file", "path": "../escape.md", "content": "x"}),
            json!({"command": "list_files", "dir": "state"}),
        ] {
            let out = dispatch(&args, &fx.env(), &mut ctx);
            assert_eq!(out["ok"], false, "{args}");
            assert!(out["error"].as_str().unwrap().contains("path not allowed"));
        }
        assert!(!fx.paths.root.parent().unwrap().join("escape.md").exists());
    }

    #[test]
    fn paper_commands_need_scholar() {
        let fx = Fixture::new();
        let out = dispatch(
            &json!({"command": "search_papers", "query": "x"}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["ok"], false);
        assert!(out["error"].as_str().unwrap().contains("S2_KEY"));
    }

    #[test]
    fn vars_round_trip_through_context() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        let out = dispatch(
            &json!({"command": "set_var", "name": "seed", "value": {"id": "p1"}}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["result"], json!({"version": 1, "previous": null}));
        let out = dispatch(&json!({"command": "get_var", "name": "seed"}), &fx.env(), &mut ctx);
        assert_eq!(out["result"], json!({"id": "p1"}));
    }

    #[test]
    fn get_env_withholds_secrets() {
        let fx = Fixture::new();
        let mut ctx = ToolContext::new();
        let out = dispatch(
            &json!({"command": "get_env", "name": "OPENAI_API_KEY"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["ok"], false);
        let out = dispatch(
            &json!({"command": "get_env", "name": "RESMAN_TEST_SURELY_UNSET", "default": "fallback"}),
            &fx.env(),
            &mut ctx,
        );
        assert_eq!(out["result"], "fallback");
    }

    #[test]
    fn missing_agent_binary_is_a_failed_outcome() {
        let mut fx = Fixture::new();
        fx.settings.claude_bin = Some("/nonexistent/claude".into());
        let out = dispatch(
            &json!({"command": "run_agent", "prompt": "fix tests"}),
            &fx.env(),
            &mut ToolContext::new(),
        );
        assert_eq!(out["ok"], true);
        assert_eq!(out["result"]["ok"], false);
        assert!(out["result"]["stderr"].as_str().unwrap().contains("not found"));
    }
}
