//! Tool schemas offered to the model and the runner that executes calls.

use resman_tools::command::{self, Command, CommandEnv};
use resman_tools::scholar::{ScholarClient, DEFAULT_FULL_TEXT_CHARS};
use resman_tools::{PdfTextExtractor, ToolContext};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LIMIT: usize = 10;

const COMMAND_NAMES: &[&str] = &[
    "append_message",
    "append_item",
    "read_entries",
    "recent_entries",
    "delete_line",
    "rewrite_entries",
    "snapshot",
    "write_summary",
    "prune",
    "refresh_briefs",
    "repo_map",
    "read_file",
    "write_file",
    "list_files",
    "search_papers",
    "paper_details",
    "recommend_papers",
    "run_agent",
    "set_var",
    "get_var",
    "get_env",
];

fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "name": name,
        "description": description,
        "parameters": parameters,
    })
}

/// Function schemas in Responses API shape. The full-text tool is only
/// offered when a PDF extractor is configured.
pub fn tool_schemas(pdf_enabled: bool) -> Vec<Value> {
    let mut tools = vec![
        function(
            "search_papers",
            "Search Semantic Scholar papers by query.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50},
                    "year": {"type": "string", "description": "Optional year or year range filter."}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ),
        function(
            "get_paper_details",
            "Get details for a paper by Semantic Scholar paper ID, DOI, ArXiv ID, etc.",
            json!({
                "type": "object",
                "properties": {"paper_id": {"type": "string"}},
                "required": ["paper_id"],
                "additionalProperties": false
            }),
        ),
        function(
            "recommend_papers",
            "Get recommended papers related to a seed paper.",
            json!({
                "type": "object",
                "properties": {
                    "paper_id": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50}
                },
                "required": ["paper_id"],
                "additionalProperties": false
            }),
        ),
    ];
    if pdf_enabled {
        tools.push(function(
            "read_full_paper_text",
            "Download and read open-access PDF text for a paper if available.",
            json!({
                "type": "object",
                "properties": {
                    "paper_id": {"type": "string"},
                    "max_chars": {"type": "integer", "minimum": 1000, "maximum": 100000}
                },
                "required": ["paper_id"],
                "additionalProperties": false
            }),
        ));
    }
    tools.push(function(
        "command",
        "Run one workspace operation on the conversation log, archive, briefs, \
         memo files under memory/, repository map, papers, coding agent, or \
         session variables. Pass the operation name in `command` and its \
         arguments alongside.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "enum": COMMAND_NAMES}
            },
            "required": ["command"],
            "additionalProperties": true
        }),
    ));
    tools
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    limit: Option<usize>,
    year: Option<String>,
}

#[derive(Deserialize)]
struct PaperArgs {
    paper_id: String,
    limit: Option<usize>,
    max_chars: Option<usize>,
}

/// Answer sent for a log rewrite queued behind the current tool round.
fn deferred_answer() -> Value {
    json!({
        "ok": true,
        "result": {
            "deferred": true,
            "note": "applied after this round's tool outputs are logged"
        }
    })
}

/// Executes tool calls for one chat session.
///
/// Commands that rewrite the log are queued instead of run, since the call
/// being answered is already in the log and its output is not yet. The
/// caller applies them with [`ToolRunner::apply_deferred`] once the round's
/// outputs are appended.
pub struct ToolRunner<'a> {
    pub env: CommandEnv<'a>,
    pub ctx: ToolContext,
    pub pdf: Option<&'a dyn PdfTextExtractor>,
    deferred: Vec<Command>,
}

impl<'a> ToolRunner<'a> {
    pub fn new(env: CommandEnv<'a>, pdf: Option<&'a dyn PdfTextExtractor>) -> Self {
        Self {
            env,
            ctx: ToolContext::new(),
            pdf,
            deferred: Vec::new(),
        }
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Run queued log rewrites in call order and return their answers.
    pub fn apply_deferred(&mut self) -> Vec<Value> {
        let queued = std::mem::take(&mut self.deferred);
        queued
            .into_iter()
            .map(|cmd| {
                let out = command::answer(command::execute(cmd, &self.env, &mut self.ctx));
                if out["ok"] != true {
                    tracing::warn!(error = %out["error"], "deferred log rewrite failed");
                }
                out
            })
            .collect()
    }

    /// Run one call. Always answers with `{ok, result | error}`.
    pub fn run(&mut self, name: &str, arguments: &str) -> Value {
        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(arguments) {
                Ok(v) => v,
                Err(e) => return json!({"ok": false, "error": format!("invalid arguments: {e}")}),
            }
        };
        if name == "command" {
            return match command::parse(&args) {
                Ok(cmd) if cmd.rewrites_log() => {
                    self.deferred.push(cmd);
                    deferred_answer()
                }
                Ok(cmd) => command::answer(command::execute(cmd, &self.env, &mut self.ctx)),
                Err(refusal) => refusal,
            };
        }
        match self.run_paper_tool(name, args) {
            Ok(Some(result)) => json!({"ok": true, "result": result}),
            Ok(None) => json!({"ok": false, "error": format!("Unknown tool: {name}")}),
            Err(e) => json!({"ok": false, "error": format!("{e:#}")}),
        }
    }

    fn scholar(&self) -> anyhow::Result<&ScholarClient> {
        self.env
            .scholar
            .ok_or_else(|| anyhow::anyhow!("Missing S2_KEY. Set it in your environment or .env file."))
    }

    fn run_paper_tool(&self, name: &str, args: Value) -> anyhow::Result<Option<Value>> {
        let result = match name {
            "search_papers" => {
                let a: SearchArgs = serde_json::from_value(args)?;
                self.scholar()?.search_papers(
                    &a.query,
                    a.limit.unwrap_or(DEFAULT_LIMIT),
                    a.year.as_deref(),
                )?
            }
            "get_paper_details" => {
                let a: PaperArgs = serde_json::from_value(args)?;
                self.scholar()?.paper_details(&a.paper_id)?
            }
            "recommend_papers" => {
                let a: PaperArgs = serde_json::from_value(args)?;
                self.scholar()?
                    .recommend_papers(&a.paper_id, a.limit.unwrap_or(DEFAULT_LIMIT))?
            }
            "read_full_paper_text" => {
                let a: PaperArgs = serde_json::from_value(args)?;
                let full = self.scholar()?.read_full_paper_text(
                    &a.paper_id,
                    a.max_chars.unwrap_or(DEFAULT_FULL_TEXT_CHARS),
                    self.pdf,
                )?;
                serde_json::to_value(full)?
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}
