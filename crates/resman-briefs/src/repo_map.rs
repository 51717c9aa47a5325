use globset::{Glob, GlobSet, GlobSetBuilder};
use resman_store::StatePaths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

pub const DEFAULT_MAX_FILES: usize = 5000;

/// Directory names never descended into.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    ".pytest_cache",
    "target",
    "node_modules",
];

/// Bounded file inventory of a directory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMap {
    /// Unix seconds.
    pub generated_at: f64,
    pub files: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct RepoMapOptions {
    pub max_files: usize,
    pub skip_dirs: Vec<String>,
    /// Globs over root-relative paths (forward slashes) to leave out.
    pub exclude: Vec<String>,
}

impl Default for RepoMapOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
        }
    }
}

impl RepoMapOptions {
    /// Defaults for mapping a workspace: the brief and map artefacts are
    /// excluded so the map never lists itself.
    pub fn for_workspace(paths: &StatePaths, max_files: usize) -> Self {
        let exclude = paths
            .generated_artifacts()
            .iter()
            .map(|p| globset::escape(&p.to_string_lossy().replace('\\', "/")))
            .collect();
        Self {
            max_files,
            exclude,
            ..Self::default()
        }
    }

    fn exclude_set(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

/// Walk `root` in file-name order and list relative file paths, stopping
/// once `max_files` are collected. `truncated` is set only when a further
/// file was left out.
pub fn build_repo_map(root: &Path, opts: &RepoMapOptions) -> anyhow::Result<RepoMap> {
    let exclude = opts.exclude_set()?;
    let mut files = Vec::new();
    let mut truncated = false;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !opts
                    .skip_dirs
                    .iter()
                    .any(|d| e.file_name().to_str() == Some(d.as_str()))
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        if exclude.is_match(&rel) {
            continue;
        }
        if files.len() >= opts.max_files {
            truncated = true;
            break;
        }
        files.push(rel);
    }

    Ok(RepoMap {
        generated_at: resman_store::unix_now_f64(),
        files,
        truncated,
    })
}

/// Build the workspace map and persist it as `repo_map.json`.
pub fn write_repo_map(paths: &StatePaths, max_files: usize) -> anyhow::Result<RepoMap> {
    let map = build_repo_map(&paths.root, &RepoMapOptions::for_workspace(paths, max_files))?;
    resman_store::write_json_pretty(&paths.repo_map_json, &map)?;
    tracing::info!(files = map.files.len(), truncated = map.truncated, "repo map written");
    Ok(map)
}
