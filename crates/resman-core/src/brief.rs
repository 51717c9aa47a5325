use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured summary of one source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub one_liner: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub key_ideas: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Set when the brief was produced without the summarizer.
    #[serde(rename = "_heuristic", default, skip_serializing_if = "is_false")]
    pub heuristic: bool,
    #[serde(rename = "_read_error", default, skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
    /// The summarizer answered, but not with schema-conformant JSON.
    #[serde(default, skip_serializing_if = "is_false")]
    pub parse_error: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Every key is required; used to validate summarizer output.
#[derive(Deserialize)]
struct StrictBrief {
    project_name: String,
    one_liner: String,
    goal: String,
    current_state: String,
    key_ideas: Vec<String>,
    open_questions: Vec<String>,
    next_actions: Vec<String>,
    keywords: Vec<String>,
}

impl Brief {
    /// Parse summarizer output. Surrounding markdown code fences are
    /// tolerated; anything else that is not a JSON object carrying all
    /// eight schema keys with the right types is rejected.
    pub fn from_model_output(raw: &str) -> Result<Self, String> {
        let body = strip_code_fence(raw.trim());
        let strict: StrictBrief =
            serde_json::from_str(body).map_err(|e| format!("invalid brief JSON: {e}"))?;
        Ok(Brief {
            project_name: strict.project_name,
            one_liner: strict.one_liner,
            goal: strict.goal,
            current_state: strict.current_state,
            key_ideas: strict.key_ideas,
            open_questions: strict.open_questions,
            next_actions: strict.next_actions,
            keywords: strict.keywords,
            heuristic: false,
            read_error: None,
            parse_error: false,
        })
    }

    /// True when no summarizer output backs this brief.
    pub fn is_fallback(&self) -> bool {
        self.heuristic || self.read_error.is_some() || self.parse_error
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Staleness record for one brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefMeta {
    pub content_hash: String,
    pub updated_at: String,
    pub model: String,
}

/// Relative path → brief. Ordered so that persisted files are deterministic.
pub type BriefMap = BTreeMap<String, Brief>;

/// Relative path → staleness record.
pub type BriefMetaMap = BTreeMap<String, BriefMeta>;
