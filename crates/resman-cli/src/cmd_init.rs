use resman_chat::DEFAULT_INSTRUCTIONS;
use resman_ledger::EventLog;
use resman_store::StatePaths;
use std::path::Path;

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = StatePaths::discover(repo_root);
    let already = paths.is_initialized();

    paths.ensure_layout()?;
    EventLog::open(paths.index_jsonl.clone()).ensure_exists()?;
    if !paths.instructions_md.exists() {
        std::fs::write(&paths.instructions_md, DEFAULT_INSTRUCTIONS)?;
    }

    if already {
        println!("Already initialized at {}", paths.state_dir.display());
    } else {
        println!("Initialized resman workspace at {}", paths.root.display());
        println!("  log:          {}", paths.index_jsonl.display());
        println!("  memos:        {}", paths.memory_dir.display());
        println!("  instructions: {}", paths.instructions_md.display());
        println!("Put OPENAI_API_KEY and S2_KEY in {}", paths.env_file.display());
    }
    Ok(())
}
