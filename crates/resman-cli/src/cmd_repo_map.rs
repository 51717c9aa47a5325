use crate::workspace::Workspace;
use resman_briefs::project_index::write_project_index;
use resman_briefs::repo_map::write_repo_map;
use resman_store::{Settings, WorkspaceLock};
use std::path::Path;

pub fn execute(cwd: &Path, max_files: Option<usize>) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let max = match max_files {
        Some(n) => n,
        None => Settings::load(&ws.paths)?.repo_map_max_files,
    };
    let _lock = WorkspaceLock::acquire(&ws.paths, "repo-map")?;
    let map = write_repo_map(&ws.paths, max)?;
    let suffix = if map.truncated { " (truncated)" } else { "" };
    println!(
        "{} files{suffix} -> {}",
        map.files.len(),
        ws.paths.repo_map_json.display()
    );
    Ok(())
}

pub fn index(cwd: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let _lock = WorkspaceLock::acquire(&ws.paths, "index")?;
    let path = write_project_index(&ws.paths)?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_briefs::RepoMap;

    #[test]
    fn map_skips_its_own_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        crate::cmd_init::execute(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        execute(tmp.path(), Some(100)).unwrap();

        let ws = Workspace::open(tmp.path()).unwrap();
        let map: RepoMap =
            serde_json::from_str(&std::fs::read_to_string(&ws.paths.repo_map_json).unwrap()).unwrap();
        assert!(map.files.contains(&"notes.txt".to_string()));
        assert!(!map.files.iter().any(|f| f.ends_with("repo_map.json")));
        assert!(!map.truncated);
    }
}
