//! Memo files the model may read and edit.
//!
//! Paths are relative to the workspace root and must resolve inside
//! `memory/`. Archive files there are write-once and refused as targets.

use crate::scholar::truncate_text;
use anyhow::Context;
use globset::GlobBuilder;
use resman_ledger::archive::{SNAPSHOT_PREFIX, SUMMARY_PREFIX};
use resman_store::StatePaths;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_READ_CHARS: usize = 200_000;
pub const DEFAULT_LIST_MAX: usize = 2000;

/// Resolve `rel` against the workspace root, refusing anything that lands
/// outside `memory/`, lexically or through a symlink.
pub fn resolve_memo_path(paths: &StatePaths, rel: &str) -> anyhow::Result<PathBuf> {
    let refuse = || anyhow::anyhow!("path not allowed: {rel}");
    let mut normalized = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(refuse());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(refuse()),
        }
    }
    let candidate = paths.root.join(&normalized);
    if !candidate.starts_with(&paths.memory_dir) {
        return Err(refuse());
    }

    if paths.memory_dir.exists() {
        let allowed = paths.memory_dir.canonicalize()?;
        let mut existing = candidate.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        if !existing.canonicalize()?.starts_with(&allowed) {
            return Err(refuse());
        }
    }
    Ok(candidate)
}

fn rel_to_root(paths: &StatePaths, path: &Path) -> String {
    path.strip_prefix(&paths.root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// UTF-8 text of a memo file, cut at `max_chars` with a marker.
pub fn read_file(paths: &StatePaths, rel: &str, max_chars: usize) -> anyhow::Result<String> {
    let path = resolve_memo_path(paths, rel)?;
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("cannot read {rel}"))?;
    Ok(truncate_text(&text, max_chars))
}

/// Replace a memo file atomically, creating parent directories. Returns
/// the workspace-relative path written.
pub fn write_file(paths: &StatePaths, rel: &str, content: &str) -> anyhow::Result<String> {
    let path = resolve_memo_path(paths, rel)?;
    if path == paths.memory_dir || path.is_dir() {
        anyhow::bail!("{rel} is a directory");
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.starts_with(SNAPSHOT_PREFIX) || name.starts_with(SUMMARY_PREFIX) {
        anyhow::bail!("{rel} is an archive file and cannot be overwritten");
    }
    resman_store::write_atomic(&path, content.as_bytes())?;
    tracing::info!(path = %rel, bytes = content.len(), "memo written");
    Ok(rel_to_root(paths, &path))
}

/// Files under `rel_dir` whose path relative to it matches `pattern`,
/// sorted and capped at `max_results`.
pub fn list_files(
    paths: &StatePaths,
    rel_dir: &str,
    pattern: &str,
    max_results: usize,
) -> anyhow::Result<Vec<String>> {
    let dir = resolve_memo_path(paths, rel_dir)?;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher();
    let mut out = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&dir) else {
            continue;
        };
        if !matcher.is_match(rel) {
            continue;
        }
        out.push(rel_to_root(paths, entry.path()));
        if out.len() >= max_results {
            break;
        }
    }
    out.sort();
    Ok(out)
}
