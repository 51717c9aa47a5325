//! One chat turn: user message in, tool calls resolved, assistant text out.
//!
//! The event log is the conversation. Every user message, function call,
//! and function output is appended in the order it happens, and the full
//! log is sent as history at the start of each turn.

use crate::model::{ModelClient, ModelRequest, ModelResponse};
use crate::tools::ToolRunner;
use resman_core::{LogEntry, Role};
use resman_tools::redact::{redact_json, redact_secrets};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_INSTRUCTIONS: &str = "You are a research assistant connected to Semantic Scholar tools.

Rules:
- Use tools when answering paper search, recommendation, and full-text questions.
- Do not claim details from a paper unless they are in tool results.
- Include paper identifiers and URLs in your answers where possible.
- If a full paper is unavailable, explain why and suggest next best actions.
";

/// Tool rounds allowed within a single turn.
pub const MAX_TOOL_ROUNDS: usize = 32;

/// Read `instructions.md`, or fall back to the built-in prompt when the
/// file is missing or blank.
pub fn load_instructions(path: &Path) -> anyhow::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => Ok(DEFAULT_INSTRUCTIONS.to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DEFAULT_INSTRUCTIONS.to_string()),
        Err(e) => Err(anyhow::anyhow!("cannot read {}: {e}", path.display())),
    }
}

/// Arguments as logged: secrets masked inside JSON strings so the record
/// stays parseable.
fn redact_arguments(arguments: &str) -> String {
    match serde_json::from_str::<Value>(arguments) {
        Ok(v) => redact_json(&v).to_string(),
        Err(_) => redact_secrets(arguments),
    }
}

pub struct ChatSession<'a> {
    model: &'a dyn ModelClient,
    instructions: String,
    tools: Vec<Value>,
    runner: ToolRunner<'a>,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        model: &'a dyn ModelClient,
        instructions: String,
        tools: Vec<Value>,
        runner: ToolRunner<'a>,
    ) -> Self {
        Self {
            model,
            instructions,
            tools,
            runner,
        }
    }

    pub fn runner(&self) -> &ToolRunner<'a> {
        &self.runner
    }

    /// Run one user turn and return the assistant's final text. Model
    /// errors abort the turn; tool errors become outputs the model sees.
    pub fn turn(&mut self, user_input: &str) -> anyhow::Result<String> {
        let log = self.runner.env.log;
        log.append_message(Role::User, user_input)?;
        let history: Vec<Value> = log.read_all()?.into_iter().map(Value::from).collect();

        let mut response = self.model.respond(&ModelRequest {
            instructions: Some(self.instructions.as_str()),
            input: history,
            tools: &self.tools,
            previous_response_id: None,
        })?;

        let mut rounds = 0;
        while !response.function_calls.is_empty() {
            rounds += 1;
            if rounds > MAX_TOOL_ROUNDS {
                anyhow::bail!("model kept calling tools after {MAX_TOOL_ROUNDS} rounds");
            }
            let outputs = self.run_calls(&response)?;
            let next = self.model.respond(&ModelRequest {
                instructions: Some(self.instructions.as_str()),
                input: outputs,
                tools: &self.tools,
                previous_response_id: Some(response.id.as_str()),
            })?;
            response = next;
        }

        let text = response.output_text;
        if !text.trim().is_empty() {
            log.append_message(Role::Assistant, text.as_str())?;
        }
        Ok(text)
    }

    /// Log and execute each call, returning the outputs to send back.
    fn run_calls(&mut self, response: &ModelResponse) -> anyhow::Result<Vec<Value>> {
        let log = self.runner.env.log;
        let mut outputs = Vec::with_capacity(response.function_calls.len());
        for call in &response.function_calls {
            log.append(&LogEntry::function_call(
                &call.name,
                &call.call_id,
                redact_arguments(&call.arguments),
            ))?;
            tracing::debug!(tool = %call.name, call_id = %call.call_id, "tool call");
            let result = redact_json(&self.runner.run(&call.name, &call.arguments));
            let output = LogEntry::function_call_output(&call.call_id, result.to_string());
            log.append(&output)?;
            outputs.push(Value::from(output));
        }
        if self.runner.has_deferred() {
            for out in self.runner.apply_deferred() {
                tracing::info!(result = %out, "applied deferred log rewrite");
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FunctionCall;
    use resman_ledger::{Archive, EventLog};
    use resman_store::{Settings, StatePaths};
    use resman_tools::CommandEnv;
    use serde_json::{json, Map};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses and records every request.
    struct ScriptedModel {
        responses: RefCell<VecDeque<ModelResponse>>,
        requests: RefCell<Vec<(Vec<Value>, Option<String>)>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelClient for ScriptedModel {
        fn respond(&self, request: &ModelRequest<'_>) -> anyhow::Result<ModelResponse> {
            self.requests.borrow_mut().push((
                request.input.clone(),
                request.previous_response_id.map(str::to_string),
            ));
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn text(id: &str, s: &str) -> ModelResponse {
        ModelResponse {
            id: id.into(),
            output_text: s.into(),
            function_calls: Vec::new(),
        }
    }

    fn calls(id: &str, calls: &[(&str, &str, &str)]) -> ModelResponse {
        ModelResponse {
            id: id.into(),
            output_text: String::new(),
            function_calls: calls
                .iter()
                .map(|(name, call_id, args)| FunctionCall {
                    name: name.to_string(),
                    call_id: call_id.to_string(),
                    arguments: args.to_string(),
                })
                .collect(),
        }
    }

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
            Self {
                log: EventLog::open(paths.index_jsonl.clone()),
                archive: Archive::new(paths.memory_dir.clone()),
                settings: Settings::from_sources(&Map::new(), |_| None).unwrap(),
                paths,
                _tmp: tmp,
            }
        }

        fn session<'a>(&'a self, model: &'a dyn ModelClient) -> ChatSession<'a> {
            let runner = ToolRunner::new(
                CommandEnv {
                    paths: &self.paths,
                    log: &self.log,
                    archive: &self.archive,
                    settings: &self.settings,
                    scholar: None,
                    summarizer: None,
                },
                None,
            );
            ChatSession::new(
                model,
                DEFAULT_INSTRUCTIONS.to_string(),
                crate::tools::tool_schemas(false),
                runner,
            )
        }
    }

    #[test]
    fn plain_turn_logs_user_and_assistant() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![text("r1", "Hi there")]);
        let out = fx.session(&model).turn("hello").unwrap();
        assert_eq!(out, "Hi there");
        assert_eq!(
            fx.log.read_all().unwrap(),
            vec![
                LogEntry::message(Role::User, "hello"),
                LogEntry::message(Role::Assistant, "Hi there"),
            ]
        );
        let reqs = model.requests.borrow();
        assert_eq!(reqs[0].0, vec![json!({"role": "user", "content": "hello"})]);
        assert_eq!(reqs[0].1, None);
    }

    #[test]
    fn tool_calls_are_logged_in_order() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![
            calls(
                "r1",
                &[
                    ("command", "c1", r#"{"command":"set_var","name":"k","value":1}"#),
                    ("python", "c2", r#"{"code":"print(1)"}"#),
                ],
            ),
            text("r2", "done"),
        ]);
        fx.session(&model).turn("go").unwrap();

        let entries = fx.log.read_all().unwrap();
        let kinds: Vec<&str> = entries.iter().map(LogEntry::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "message",
                "function_call",
                "function_call_output",
                "function_call",
                "function_call_output",
                "message"
            ]
        );
        assert_eq!(entries[2].call_id(), Some("c1"));
        let LogEntry::FunctionCallOutput { output, .. } = &entries[4] else {
            panic!("expected output record");
        };
        let output: Value = serde_json::from_str(output).unwrap();
        assert_eq!(output, json!({"ok": false, "error": "Unknown tool: python"}));

        let reqs = model.requests.borrow();
        assert_eq!(reqs[1].1.as_deref(), Some("r1"));
        assert_eq!(reqs[1].0.len(), 2);
        assert_eq!(reqs[1].0[0]["type"], "function_call_output");
    }

    #[test]
    fn empty_assistant_text_is_not_logged() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![text("r1", "  ")]);
        fx.session(&model).turn("hello").unwrap();
        assert_eq!(fx.log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn history_includes_earlier_turns() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![text("r1", "one"), text("r2", "two")]);
        let mut session = fx.session(&model);
        session.turn("first").unwrap();
        session.turn("second").unwrap();
        let reqs = model.requests.borrow();
        assert_eq!(reqs[1].0.len(), 3);
        assert_eq!(reqs[1].0[2]["content"], "second");
    }

    #[test]
    fn tool_output_is_redacted() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![
            calls(
                "r1",
                &[(
                    "command",
                    "c1",
                    r#"{"command":"set_var","name":"k","value":"token=abcdef"}"#,
                )],
            ),
            calls(
                "r2",
                &[("command", "c2", r#"{"command":"get_var","name":"k"}"#)],
            ),
            text("r3", "ok"),
        ]);
        let mut session = fx.session(&model);
        session.turn("go").unwrap();
        let raw = std::fs::read_to_string(fx.log.path()).unwrap();
        assert!(raw.contains("token=[REDACTED]"));
        assert_eq!(session.runner().ctx.get("k"), Some(&json!("token=abcdef")));
    }

    /// Every output must follow a call with the same id.
    fn assert_outputs_paired(entries: &[LogEntry]) {
        for (i, e) in entries.iter().enumerate() {
            if let LogEntry::FunctionCallOutput { call_id, .. } = e {
                assert!(
                    entries[..i]
                        .iter()
                        .any(|c| c.kind() == "function_call" && c.call_id() == Some(call_id.as_str())),
                    "output {call_id} has no earlier call"
                );
            }
        }
    }

    #[test]
    fn log_rewrites_wait_for_the_round_to_be_logged() {
        let fx = Fixture::new();
        for i in 0..4 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            fx.log.append_message(role, format!("m{i}")).unwrap();
        }
        let model = ScriptedModel::new(vec![
            calls(
                "r1",
                &[(
                    "command",
                    "c1",
                    r#"{"command":"prune","policy":"turns","keep_last":3}"#,
                )],
            ),
            text("r2", "done"),
        ]);
        fx.session(&model).turn("go").unwrap();

        let entries = fx.log.read_all().unwrap();
        assert_outputs_paired(&entries);
        assert_eq!(
            entries,
            vec![
                LogEntry::message(Role::User, "m2"),
                LogEntry::message(Role::Assistant, "m3"),
                LogEntry::message(Role::User, "go"),
                LogEntry::message(Role::Assistant, "done"),
            ]
        );
        assert_eq!(fx.archive.list().unwrap().len(), 1);

        let reqs = model.requests.borrow();
        let answer: Value = serde_json::from_str(reqs[1].0[0]["output"].as_str().unwrap()).unwrap();
        assert_eq!(answer["result"]["deferred"], true);
    }

    #[test]
    fn deferred_delete_keeps_pairs_of_later_rounds() {
        let fx = Fixture::new();
        fx.log.append_message(Role::User, "stale").unwrap();
        let model = ScriptedModel::new(vec![
            calls("r1", &[("command", "c1", r#"{"command":"delete_line","line":1}"#)]),
            calls("r2", &[("command", "c2", r#"{"command":"get_var","name":"x"}"#)]),
            text("r3", "done"),
        ]);
        fx.session(&model).turn("go").unwrap();

        let entries = fx.log.read_all().unwrap();
        assert_outputs_paired(&entries);
        assert_eq!(entries[0], LogEntry::message(Role::User, "go"));
        let kinds: Vec<&str> = entries.iter().map(LogEntry::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "message",
                "function_call",
                "function_call_output",
                "function_call",
                "function_call_output",
                "message"
            ]
        );
    }

    #[test]
    fn call_arguments_are_redacted() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(vec![
            calls(
                "r1",
                &[(
                    "command",
                    "c1",
                    r#"{"command":"set_var","name":"k","value":"token=abcdef"}"#,
                )],
            ),
            text("r2", "ok"),
        ]);
        fx.session(&model).turn("go").unwrap();
        let entries = fx.log.read_all().unwrap();
        let LogEntry::FunctionCall { arguments, .. } = &entries[1] else {
            panic!("expected call record");
        };
        let args: Value = serde_json::from_str(arguments).unwrap();
        assert_eq!(args["value"], "token=[REDACTED]");
        assert!(!std::fs::read_to_string(fx.log.path()).unwrap().contains("abcdef"));
    }

    #[test]
    fn model_failure_keeps_user_message() {
        let fx = Fixture::new();
        let model = ScriptedModel::new(Vec::new());
        assert!(fx.session(&model).turn("hello").is_err());
        assert_eq!(
            fx.log.read_all().unwrap(),
            vec![LogEntry::message(Role::User, "hello")]
        );
    }

    #[test]
    fn instructions_fall_back_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("instructions.md");
        assert_eq!(load_instructions(&path).unwrap(), DEFAULT_INSTRUCTIONS);
        std::fs::write(&path, "Be terse.").unwrap();
        assert_eq!(load_instructions(&path).unwrap(), "Be terse.");
    }
}
