use resman_ledger::{Archive, EventLog};
use resman_store::StatePaths;
use std::path::Path;

/// An initialized workspace found at or above the working directory.
pub struct Workspace {
    pub paths: StatePaths,
    pub log: EventLog,
    pub archive: Archive,
}

impl Workspace {
    pub fn open(cwd: &Path) -> anyhow::Result<Self> {
        let Some(root) = StatePaths::find_root(cwd) else {
            anyhow::bail!("No resman workspace found. Run `resman init` first.");
        };
        let paths = StatePaths::discover(root);
        Ok(Self {
            log: EventLog::open(paths.index_jsonl.clone()),
            archive: Archive::new(paths.memory_dir.clone()),
            paths,
        })
    }
}
