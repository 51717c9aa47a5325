//! OpenAI Responses API client.

use crate::model::{FunctionCall, ModelClient, ModelRequest, ModelResponse};
use anyhow::Context;
use resman_briefs::Summarizer;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const TIMEOUT: Duration = Duration::from_secs(300);

pub struct OpenAiClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    api_base: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            api_key: api_key.into(),
            model: model.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, request: &ModelRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": request.input,
        });
        if let Some(instructions) = request.instructions {
            body["instructions"] = json!(instructions);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        if let Some(prev) = request.previous_response_id {
            body["previous_response_id"] = json!(prev);
        }
        body
    }
}

impl ModelClient for OpenAiClient {
    fn respond(&self, request: &ModelRequest<'_>) -> anyhow::Result<ModelResponse> {
        let url = format!("{}/responses", self.api_base);
        let body = self.request_body(request);
        let mut resp = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.to_string())
            .context("model API request failed")?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let text = resp.body_mut().read_to_string().unwrap_or_default();
            anyhow::bail!("model API error ({status}): {text}");
        }
        let value: Value = resp
            .body_mut()
            .read_json()
            .context("failed to parse model API response")?;
        parse_response(&value)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Pull the id, the concatenated output text, and any function calls out of
/// a Responses API payload.
pub fn parse_response(value: &Value) -> anyhow::Result<ModelResponse> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .context("model response has no id")?
        .to_string();
    let mut out = ModelResponse {
        id,
        ..ModelResponse::default()
    };
    let items = value.get("output").and_then(Value::as_array);
    for item in items.into_iter().flatten() {
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let field = |k: &str| {
                    item.get(k)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                out.function_calls.push(FunctionCall {
                    name: field("name"),
                    call_id: field("call_id"),
                    arguments: field("arguments"),
                });
            }
            Some("message") => {
                let parts = item.get("content").and_then(Value::as_array);
                for part in parts.into_iter().flatten() {
                    if part.get("type").and_then(Value::as_str) == Some("output_text") {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            out.output_text.push_str(text);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Brief summarizer backed by a model client. Sends the prompt as a single
/// user message with no tools.
pub struct OpenAiSummarizer<'a> {
    client: &'a dyn ModelClient,
}

impl<'a> OpenAiSummarizer<'a> {
    pub fn new(client: &'a dyn ModelClient) -> Self {
        Self { client }
    }
}

impl Summarizer for OpenAiSummarizer<'_> {
    fn summarize(&self, prompt: &str) -> anyhow::Result<String> {
        let request = ModelRequest {
            input: vec![json!({"role": "user", "content": prompt})],
            ..ModelRequest::default()
        };
        Ok(self.client.respond(&request)?.output_text)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}
