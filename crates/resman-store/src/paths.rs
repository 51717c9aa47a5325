use std::path::{Path, PathBuf};

/// All well-known paths of a resman workspace.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub index_jsonl: PathBuf,
    pub memory_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub briefs_json: PathBuf,
    pub briefs_meta_json: PathBuf,
    pub repo_map_json: PathBuf,
    pub project_index_md: PathBuf,
    pub logs_dir: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
    pub instructions_md: PathBuf,
    pub env_file: PathBuf,
}

impl StatePaths {
    /// Derive all paths from a workspace root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join("state");
        let generated_dir = state_dir.join("generated");
        Self {
            index_jsonl: state_dir.join("index.jsonl"),
            memory_dir: root.join("memory"),
            briefs_json: generated_dir.join("briefs.json"),
            briefs_meta_json: generated_dir.join("briefs_meta.json"),
            repo_map_json: generated_dir.join("repo_map.json"),
            project_index_md: generated_dir.join("project_index.md"),
            logs_dir: state_dir.join("logs"),
            config_json: state_dir.join("config.json"),
            lock_file: state_dir.join("LOCK"),
            instructions_md: root.join("instructions.md"),
            env_file: root.join(".env"),
            generated_dir,
            state_dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [
            &self.state_dir,
            &self.memory_dir,
            &self.generated_dir,
            &self.logs_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Workspace-relative artefacts the repository map must never list.
    pub fn generated_artifacts(&self) -> Vec<PathBuf> {
        [
            &self.briefs_json,
            &self.briefs_meta_json,
            &self.repo_map_json,
        ]
        .into_iter()
        .filter_map(|p| p.strip_prefix(&self.root).ok().map(Path::to_path_buf))
        .collect()
    }

    /// Walk up from `start` looking for a directory containing `state/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join("state").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}
