use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // OpenAI / Anthropic keys: sk-..., sk-proj-..., sk-ant-...
        (
            Regex::new(r"\b(sk-[a-zA-Z0-9_-]{20,})").unwrap(),
            "[REDACTED_API_KEY]",
        ),
        (
            Regex::new(r"\b(ghp_[a-zA-Z0-9]{36,}|github_pat_[a-zA-Z0-9_]{22,})").unwrap(),
            "[REDACTED_GITHUB_TOKEN]",
        ),
        (
            Regex::new(r"(?i)(Bearer\s+)[a-zA-Z0-9._\-]{20,}").unwrap(),
            "${1}[REDACTED_BEARER]",
        ),
        // x-api-key: ... as echoed by curl -v and friends
        (
            Regex::new(r"(?i)(x-api-key:\s*)\S+").unwrap(),
            "${1}[REDACTED]",
        ),
        (
            Regex::new(r"(?i)\b(\w*(?:api_key|apikey|secret|token|password|s2_key))=[^\s&]+").unwrap(),
            "${1}=[REDACTED]",
        ),
    ]
});

/// Replace API keys, tokens, and `NAME=secret` assignments with
/// `[REDACTED*]` placeholders.
pub fn redact_secrets(input: &str) -> String {
    let mut output = input.to_string();
    for (pat, replacement) in SECRET_PATTERNS.iter() {
        output = pat.replace_all(&output, *replacement).into_owned();
    }
    output
}

/// Redact every string inside a JSON value.
pub fn redact_json(val: &Value) -> Value {
    match val {
        Value::String(s) => Value::String(redact_secrets(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_json(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Environment variable names whose values are never handed out.
pub fn is_secret_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    ["KEY", "SECRET", "TOKEN", "PASSWORD", "CREDENTIAL"]
        .iter()
        .any(|m| upper.contains(m))
}
