use crate::cache::{collect_sources, rel_key};
use crate::heuristic;
use resman_core::BriefMap;
use resman_store::StatePaths;
use std::path::{Path, PathBuf};

const CAPABILITIES: &[&str] = &[
    "- `resman log`: read or delete records of state/index.jsonl",
    "- `resman snapshot` / `resman summary`: archive the conversation under memory/",
    "- `resman prune`: shrink the log after a mandatory snapshot",
    "- `resman briefs`: refresh cached memo briefs (content-addressed)",
    "- `resman repo-map`: bounded inventory of the workspace",
    "- command tool: the same operations, callable by the model",
    "- command tool: `read_file` / `write_file` / `list_files` on memos, confined to memory/",
];

/// One memo line: its stem, location, and one-liner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub stem: String,
    pub rel: String,
    pub one_liner: String,
}

fn row_for(path: &Path, root: &Path, briefs: &BriefMap) -> IndexRow {
    let rel = rel_key(path, root);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let from_brief = [rel.as_str(), name.as_str()]
        .iter()
        .filter_map(|k| briefs.get(*k))
        .map(|b| b.one_liner.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string);
    let one_liner = from_brief.unwrap_or_else(|| {
        std::fs::read(path)
            .map(|b| heuristic::one_liner(&String::from_utf8_lossy(&b)))
            .unwrap_or_default()
    });
    IndexRow {
        stem: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        rel,
        one_liner,
    }
}

/// Render the markdown index of memos in `paths.memory_dir`.
pub fn render_project_index(paths: &StatePaths) -> anyhow::Result<String> {
    let briefs: BriefMap = resman_store::load_json_or_default(&paths.briefs_json);
    let mut out = vec![
        "# Project Index (auto-generated)".to_string(),
        String::new(),
        "## memory/ (project memos)".to_string(),
    ];
    for source in collect_sources(&paths.memory_dir)? {
        let row = row_for(&source, &paths.root, &briefs);
        out.push(format!("- **{}** ({}): {}", row.stem, row.rel, row.one_liner));
    }
    out.push(String::new());
    out.push("## Capabilities".to_string());
    out.extend(CAPABILITIES.iter().map(|s| s.to_string()));
    Ok(out.join("\n") + "\n")
}

pub fn write_project_index(paths: &StatePaths) -> anyhow::Result<PathBuf> {
    let text = render_project_index(paths)?;
    resman_store::write_atomic(&paths.project_index_md, text.as_bytes())?;
    Ok(paths.project_index_md.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_core::Brief;
    use std::fs;

    #[test]
    fn index_prefers_brief_one_liner() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StatePaths::discover(tmp.path());
        paths.ensure_layout().unwrap();
        fs::write(paths.memory_dir.join("atlas.md"), "# Atlas\nfrom file\n").unwrap();
        fs::write(paths.memory_dir.join("beacon.md"), "# Beacon\nOne-liner: eval harness\n").unwrap();
        fs::write(paths.memory_dir.join("index_snapshot_1_x.jsonl"), "").unwrap();
        fs::write(paths.memory_dir.join("conversation_1_x.md"), "# c").unwrap();

        let mut briefs = BriefMap::new();
        briefs.insert(
            "memory/atlas.md".into(),
            Brief {
                one_liner: "from brief".into(),
                ..Brief::default()
            },
        );
        resman_store::write_json_pretty(&paths.briefs_json, &briefs).unwrap();

        let out = write_project_index(&paths).unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert!(text.starts_with("# Project Index (auto-generated)\n\n## memory/ (project memos)\n"));
        assert!(text.contains("- **atlas** (memory/atlas.md): from brief\n"));
        assert!(text.contains("- **beacon** (memory/beacon.md): eval harness\n"));
        assert!(!text.contains("conversation_1_x"));
        assert!(text.contains("## Capabilities"));
    }

    #[test]
    fn empty_memory_dir_still_renders() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StatePaths::discover(tmp.path());
        let text = render_project_index(&paths).unwrap();
        assert!(text.contains("## memory/ (project memos)\n\n## Capabilities"));
    }
}
