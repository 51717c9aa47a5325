//! Workspace configuration: `state/config.json` layered with environment
//! variables (after loading `.env`).

use crate::paths::StatePaths;
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_KEEP_LAST: usize = 50;
pub const DEFAULT_REPO_MAP_MAX_FILES: usize = 5000;
pub const DEFAULT_CLAUDE_TIMEOUT_S: u64 = 1800;

/// Keys understood by `Settings`. Anything else in `config.json` is kept
/// but ignored.
pub const KNOWN_KEYS: &[&str] = &[
    "model",
    "prune.keep_last",
    "repo_map.max_files",
    "claude.bin",
    "claude.timeout_s",
    "pdf.enabled",
];

/// Read config from `state/config.json`. Returns empty map if file doesn't exist.
pub fn read_config(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: Value = serde_json::from_str(&content)?;
    match val {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

pub fn write_config(path: &Path, config: &Map<String, Value>) -> anyhow::Result<()> {
    crate::write_json_pretty(path, config)
}

/// Parse a CLI string into a JSON value (bool/number/string).
pub fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Deployment environment from `RM_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnv {
    Dev,
    Prod,
}

impl std::str::FromStr for RunEnv {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "dev" => Ok(RunEnv::Dev),
            "prod" => Ok(RunEnv::Prod),
            _ => anyhow::bail!("RM_ENV must be one of: dev, prod"),
        }
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: RunEnv,
    pub openai_api_key: Option<String>,
    /// Name of the variable the OpenAI key came from.
    pub api_key_source: &'static str,
    pub s2_key: Option<String>,
    pub model: String,
    pub keep_last: usize,
    pub repo_map_max_files: usize,
    pub claude_bin: Option<String>,
    pub claude_timeout_s: u64,
    /// Whether a PDF text extractor is available to the full-text tool.
    pub pdf_enabled: bool,
}

impl Settings {
    /// Load `.env` (overriding the process environment, so the file wins),
    /// then resolve settings from `config.json` and the environment.
    pub fn load(paths: &StatePaths) -> anyhow::Result<Self> {
        if paths.env_file.exists() {
            dotenvy::from_path_override(&paths.env_file).map_err(|e| {
                anyhow::anyhow!("cannot load {}: {e}", paths.env_file.display())
            })?;
        }
        let config = read_config(&paths.config_json)?;
        Self::from_sources(&config, |k| std::env::var(k).ok())
    }

    /// Pure resolution from a config map and an environment lookup.
    pub fn from_sources<F>(config: &Map<String, Value>, env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| env(k).filter(|v| !v.trim().is_empty());

        let env_name = env("RM_ENV").unwrap_or_else(|| "dev".into());
        let run_env: RunEnv = env_name.parse()?;

        let (api_key_source, openai_api_key) = match non_empty("OPENAI_API_KEY_COMPANY") {
            Some(k) => ("OPENAI_API_KEY_COMPANY", Some(k)),
            None => ("OPENAI_API_KEY", non_empty("OPENAI_API_KEY")),
        };

        Ok(Self {
            env: run_env,
            openai_api_key,
            api_key_source,
            s2_key: non_empty("S2_KEY"),
            model: config_str(config, "model")
                .or_else(|| non_empty("RM_MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            keep_last: config_u64(config, "prune.keep_last")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_KEEP_LAST),
            repo_map_max_files: config_u64(config, "repo_map.max_files")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_REPO_MAP_MAX_FILES),
            claude_bin: config_str(config, "claude.bin"),
            claude_timeout_s: config_u64(config, "claude.timeout_s")
                .unwrap_or(DEFAULT_CLAUDE_TIMEOUT_S),
            pdf_enabled: config
                .get("pdf.enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// The model API key, or a startup error naming both variables.
    pub fn require_openai_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Missing OpenAI key. Set OPENAI_API_KEY_COMPANY or OPENAI_API_KEY in your environment or .env file."
            )
        })
    }

    pub fn require_s2_key(&self) -> anyhow::Result<&str> {
        self.s2_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Missing S2_KEY. Set it in your environment or .env file."))
    }
}

fn config_str(config: &Map<String, Value>, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn config_u64(config: &Map<String, Value>, key: &str) -> Option<u64> {
    config.get(key).and_then(Value::as_u64)
}
