use crate::workspace::Workspace;
use resman_ledger::{prune_log, PrunePolicy};
use resman_store::{Settings, WorkspaceLock};
use std::path::Path;

pub fn execute(
    cwd: &Path,
    policy: PrunePolicy,
    keep_last: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let n = match keep_last {
        Some(n) => n,
        None => Settings::load(&ws.paths)?.keep_last,
    };

    if dry_run {
        let outcome = policy.apply(&ws.log.read_all()?, n);
        println!(
            "[dry-run] {policy:?}: would keep {} of {} records ({} messages)",
            outcome.kept, outcome.original, outcome.original_messages
        );
        return Ok(());
    }

    let _lock = WorkspaceLock::acquire(&ws.paths, "prune")?;
    let report = prune_log(&ws.log, &ws.archive, policy, n)?;
    println!("Snapshot: {}", report.snapshot.display());
    if report.rewritten {
        println!(
            "Pruned ({policy:?}): kept {} of {} records",
            report.outcome.kept, report.outcome.original
        );
    } else {
        println!("Nothing to prune: {} records kept", report.outcome.original);
    }
    if policy == PrunePolicy::Turns {
        println!("note: tool-call records were dropped; call/output pairs are gone");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_core::Role;

    fn workspace_with(n: usize) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        crate::cmd_init::execute(tmp.path()).unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        for i in 0..n {
            ws.log.append_message(Role::User, format!("m{i}")).unwrap();
        }
        tmp
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = workspace_with(5);
        execute(tmp.path(), PrunePolicy::Messages, Some(2), true).unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        assert_eq!(ws.log.read_all().unwrap().len(), 5);
        assert!(ws.archive.list().unwrap().is_empty());
    }

    #[test]
    fn prune_snapshots_then_keeps_tail() {
        let tmp = workspace_with(5);
        execute(tmp.path(), PrunePolicy::Turns, Some(2), false).unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        assert_eq!(ws.log.read_all().unwrap().len(), 2);
        assert_eq!(ws.archive.list().unwrap().len(), 1);
    }
}
