use crate::paths::StatePaths;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

/// Who holds the workspace lock, as recorded inside `state/LOCK`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub command: String,
    pub pid: u32,
    pub since: String,
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`resman {}` (pid {}, since {})", self.command, self.pid, self.since)
    }
}

/// Exclusive lock on `state/LOCK` for commands that mutate the log, the
/// archive, or generated artefacts. The holder is written into the file so
/// a refused command can say who is in the way. Released when dropped.
pub struct WorkspaceLock {
    file: File,
    holder: LockHolder,
}

impl WorkspaceLock {
    /// Take the lock for `command` without blocking.
    pub fn acquire(paths: &StatePaths, command: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&paths.state_dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)
            .map_err(|e| {
                anyhow::anyhow!("cannot open lock file {}: {}", paths.lock_file.display(), e)
            })?;

        if file.try_lock_exclusive().is_err() {
            return Err(match Self::read_holder(paths) {
                Some(holder) => anyhow::anyhow!("workspace is in use by {holder}"),
                None => anyhow::anyhow!(
                    "workspace is in use by another resman process ({})",
                    paths.lock_file.display()
                ),
            });
        }

        let holder = LockHolder {
            command: command.to_string(),
            pid: std::process::id(),
            since: crate::now_rfc3339(),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string(&holder)?.as_bytes())?;
        file.flush()?;
        tracing::debug!(command, pid = holder.pid, "workspace lock acquired");
        Ok(Self { file, holder })
    }

    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }

    /// The recorded holder, if the lock file names one.
    pub fn read_holder(paths: &StatePaths) -> Option<LockHolder> {
        let text = std::fs::read_to_string(&paths.lock_file).ok()?;
        serde_json::from_str(text.trim()).ok()
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        // Stale holder info would be misleading once the lock is free.
        let _ = self.file.set_len(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_blocks_second_holder() {
        let tmp = tempfile::tempdir().unwrap();
        let p = StatePaths::discover(tmp.path());
        let lock = WorkspaceLock::acquire(&p, "init").unwrap();
        assert!(p.lock_file.exists());
        assert!(WorkspaceLock::acquire(&p, "init").is_err());
        drop(lock);
        let _again = WorkspaceLock::acquire(&p, "init").unwrap();
    }

    // Reading a locked file only works where locks are advisory.
    #[cfg(unix)]
    #[test]
    fn second_holder_is_told_who_has_it() {
        let tmp = tempfile::tempdir().unwrap();
        let p = StatePaths::discover(tmp.path());

        let lock = WorkspaceLock::acquire(&p, "chat").unwrap();
        assert_eq!(lock.holder().command, "chat");
        assert_eq!(WorkspaceLock::read_holder(&p).as_ref(), Some(lock.holder()));

        let err = WorkspaceLock::acquire(&p, "prune").err().unwrap().to_string();
        assert!(err.contains("`resman chat`"), "{err}");
        assert!(err.contains(&format!("pid {}", std::process::id())), "{err}");

        drop(lock);
        assert_eq!(WorkspaceLock::read_holder(&p), None);
        let again = WorkspaceLock::acquire(&p, "prune").unwrap();
        assert_eq!(WorkspaceLock::read_holder(&p).unwrap().command, "prune");
        drop(again);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_holder_falls_back_to_path() {
        let tmp = tempfile::tempdir().unwrap();
        let p = StatePaths::discover(tmp.path());
        let lock = WorkspaceLock::acquire(&p, "briefs").unwrap();
        std::fs::write(&p.lock_file, "garbage").unwrap();
        let err = WorkspaceLock::acquire(&p, "log").err().unwrap().to_string();
        assert!(err.contains("another resman process"), "{err}");
        drop(lock);
    }
}
