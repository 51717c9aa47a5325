//! Content-addressed brief cache.
//!
//! `briefs.json` maps a document's relative path to its [`Brief`];
//! `briefs_meta.json` maps the same key to the content hash the brief was
//! computed from. A brief is recomputed only when that hash changes or a
//! refresh is forced. Both files are rewritten together on every refresh.

use crate::heuristic::heuristic_brief;
use resman_core::hash::content_hash;
use resman_core::{Brief, BriefMap, BriefMeta, BriefMetaMap};
use resman_store::StatePaths;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Model name recorded for briefs that did not come from a summarizer.
pub const HEURISTIC_MODEL: &str = "heuristic";

/// Keys and value shapes the summarizer must return.
pub const BRIEF_SCHEMA: &str = r#"{
  "project_name": "string",
  "one_liner": "string",
  "goal": "string",
  "current_state": "string",
  "key_ideas": [
    "string"
  ],
  "open_questions": [
    "string"
  ],
  "next_actions": [
    "string"
  ],
  "keywords": [
    "string"
  ]
}"#;

/// Turns a prompt into (hopefully) brief-shaped JSON text.
pub trait Summarizer {
    fn summarize(&self, prompt: &str) -> anyhow::Result<String>;

    /// Recorded in `BriefMeta.model`.
    fn model_name(&self) -> &str;
}

/// Fixed prompt for one document.
pub fn make_prompt(rel: &str, text: &str) -> String {
    format!(
        "You are summarizing a project research memo for later reuse.\n\
         Return STRICT JSON only. No markdown.\n\
         \n\
         Schema (keys required):\n\
         {BRIEF_SCHEMA}\n\
         \n\
         FILE: {rel}\n\
         \n\
         CONTENT:\n\
         {text}\n"
    )
}

/// Where the two cache maps live.
#[derive(Debug, Clone)]
pub struct BriefFiles {
    pub briefs: PathBuf,
    pub meta: PathBuf,
}

impl BriefFiles {
    pub fn from_paths(paths: &StatePaths) -> Self {
        Self {
            briefs: paths.briefs_json.clone(),
            meta: paths.briefs_meta_json.clone(),
        }
    }

    pub fn load(&self) -> (BriefMap, BriefMetaMap) {
        (
            resman_store::load_json_or_default(&self.briefs),
            resman_store::load_json_or_default(&self.meta),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshError {
    pub rel: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<RefreshError>,
}

/// Bring the cache up to date for `sources`.
///
/// Every processed document ends up with a brief: summarizer failures and
/// unusable output fall back to the heuristic brief and never fail the
/// batch. Summarizer failures and rejected output are reported in `errors`.
pub fn refresh_briefs(
    sources: &[PathBuf],
    base_dir: &Path,
    files: &BriefFiles,
    summarizer: Option<&dyn Summarizer>,
    force: bool,
) -> anyhow::Result<RefreshReport> {
    let (mut briefs, mut meta) = files.load();
    let mut report = RefreshReport::default();

    for source in sources {
        let rel = rel_key(source, base_dir);
        let text = match std::fs::read_to_string(source) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(%rel, error = %e, "cannot read source, storing heuristic brief");
                let lossy = std::fs::read(source)
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_default();
                let mut brief = heuristic_brief(source, &lossy);
                brief.read_error = Some(e.to_string());
                briefs.insert(rel.clone(), brief);
                // No hash describes this brief; the next readable run recomputes it.
                meta.remove(&rel);
                report.updated.push(rel);
                continue;
            }
        };

        let hash = content_hash(&text);
        if !force && meta.get(&rel).is_some_and(|m| m.content_hash == hash) {
            tracing::debug!(%rel, "brief up to date");
            report.skipped.push(rel);
            continue;
        }

        let (brief, model) = summarize_one(source, &rel, &text, summarizer, &mut report.errors);
        briefs.insert(rel.clone(), brief);
        meta.insert(
            rel.clone(),
            BriefMeta {
                content_hash: hash,
                updated_at: resman_store::now_rfc3339(),
                model,
            },
        );
        report.updated.push(rel);
    }

    resman_store::write_json_pretty(&files.briefs, &briefs)?;
    resman_store::write_json_pretty(&files.meta, &meta)?;
    tracing::info!(
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "briefs refreshed"
    );
    Ok(report)
}

fn summarize_one(
    source: &Path,
    rel: &str,
    text: &str,
    summarizer: Option<&dyn Summarizer>,
    errors: &mut Vec<RefreshError>,
) -> (Brief, String) {
    let Some(summarizer) = summarizer else {
        return (heuristic_brief(source, text), HEURISTIC_MODEL.to_string());
    };
    match summarizer.summarize(&make_prompt(rel, text)) {
        Ok(raw) => match Brief::from_model_output(&raw) {
            Ok(brief) => (brief, summarizer.model_name().to_string()),
            Err(e) => {
                tracing::warn!(%rel, error = %e, "summarizer output rejected, using heuristic");
                errors.push(RefreshError {
                    rel: rel.to_string(),
                    error: format!("unusable summarizer output: {e}"),
                });
                let mut brief = heuristic_brief(source, text);
                brief.parse_error = true;
                (brief, HEURISTIC_MODEL.to_string())
            }
        },
        Err(e) => {
            tracing::warn!(%rel, error = %e, "summarizer failed, using heuristic");
            errors.push(RefreshError {
                rel: rel.to_string(),
                error: format!("{e:#}"),
            });
            (heuristic_brief(source, text), HEURISTIC_MODEL.to_string())
        }
    }
}

/// Cache key: path relative to `base_dir` with forward slashes.
pub fn rel_key(path: &Path, base_dir: &Path) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// True for memo documents; archive files and `_`-prefixed files are not memos.
pub fn is_project_memo(name: &str) -> bool {
    !(name.starts_with('_')
        || name.starts_with("conversation_")
        || name.starts_with("index_snapshot_")
        || name.contains("compact_summary"))
}

/// Markdown memos directly inside `dir`, sorted. A missing directory has
/// no memos.
pub fn collect_sources(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_project_memo(name) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
