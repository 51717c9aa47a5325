use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Developer => "developer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "developer" => Ok(Role::Developer),
            _ => Err(format!(
                "invalid role: {s}. Expected: user, assistant, system, developer"
            )),
        }
    }
}

/// One record of the event log.
///
/// Records whose shape matches none of the known kinds are kept as `Other`
/// so that a rewrite reproduces them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum LogEntry {
    Message {
        role: Role,
        content: String,
    },
    FunctionCall {
        name: String,
        call_id: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
    Other(Map<String, Value>),
}

impl LogEntry {
    pub fn message(role: Role, content: impl Into<String>) -> Self {
        LogEntry::Message {
            role,
            content: content.into(),
        }
    }

    pub fn function_call(
        name: impl Into<String>,
        call_id: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        LogEntry::FunctionCall {
            name: name.into(),
            call_id: call_id.into(),
            arguments: arguments.into(),
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        LogEntry::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// Wire name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LogEntry::Message { .. } => "message",
            LogEntry::FunctionCall { .. } => "function_call",
            LogEntry::FunctionCallOutput { .. } => "function_call_output",
            LogEntry::Other(_) => "other",
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, LogEntry::Message { .. })
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            LogEntry::Message { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            LogEntry::FunctionCall { call_id, .. } | LogEntry::FunctionCallOutput { call_id, .. } => {
                Some(call_id.as_str())
            }
            _ => None,
        }
    }

    /// Parse a JSON object into the most specific kind. Keys beyond a kind's
    /// own fields make the record `Other`.
    pub fn from_object(map: Map<String, Value>) -> Self {
        match classify(&map) {
            Some(entry) => entry,
            None => LogEntry::Other(map),
        }
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str())
}

fn has_only(map: &Map<String, Value>, keys: &[&str]) -> bool {
    map.len() == keys.len() && keys.iter().all(|k| map.contains_key(*k))
}

fn message_fields(map: &Map<String, Value>) -> Option<LogEntry> {
    let role = str_field(map, "role")?.parse().ok()?;
    let content = str_field(map, "content")?;
    Some(LogEntry::message(role, content))
}

fn classify(map: &Map<String, Value>) -> Option<LogEntry> {
    match str_field(map, "type") {
        None => {
            if !has_only(map, &["role", "content"]) {
                return None;
            }
            message_fields(map)
        }
        // Typed messages are read as messages and written back untyped.
        Some("message") => {
            if !has_only(map, &["type", "role", "content"]) {
                return None;
            }
            message_fields(map)
        }
        Some("function_call") => {
            if !has_only(map, &["type", "name", "call_id", "arguments"]) {
                return None;
            }
            Some(LogEntry::function_call(
                str_field(map, "name")?,
                str_field(map, "call_id")?,
                str_field(map, "arguments")?,
            ))
        }
        Some("function_call_output") => {
            if !has_only(map, &["type", "call_id", "output"]) {
                return None;
            }
            Some(LogEntry::function_call_output(
                str_field(map, "call_id")?,
                str_field(map, "output")?,
            ))
        }
        Some(_) => None,
    }
}

impl TryFrom<Value> for LogEntry {
    type Error = String;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(LogEntry::from_object(map)),
            other => Err(format!(
                "log record must be a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

impl From<LogEntry> for Value {
    fn from(entry: LogEntry) -> Self {
        let mut map = Map::new();
        match entry {
            LogEntry::Message { role, content } => {
                map.insert("role".into(), Value::String(role.as_str().into()));
                map.insert("content".into(), Value::String(content));
            }
            LogEntry::FunctionCall {
                name,
                call_id,
                arguments,
            } => {
                map.insert("type".into(), Value::String("function_call".into()));
                map.insert("name".into(), Value::String(name));
                map.insert("call_id".into(), Value::String(call_id));
                map.insert("arguments".into(), Value::String(arguments));
            }
            LogEntry::FunctionCallOutput { call_id, output } => {
                map.insert("type".into(), Value::String("function_call_output".into()));
                map.insert("call_id".into(), Value::String(call_id));
                map.insert("output".into(), Value::String(output));
            }
            LogEntry::Other(other) => return Value::Object(other),
        }
        Value::Object(map)
    }
}

pub fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
