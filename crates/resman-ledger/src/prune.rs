//! Retention policies for the event log.
//!
//! Both policies count message records, not raw records, and are pure over
//! the entries they are given. [`prune_log`] is the only place that writes:
//! it snapshots first, then rewrites.

use crate::archive::Archive;
use crate::log::EventLog;
use resman_core::error::Result;
use resman_core::LogEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Label used for the snapshot taken before every prune.
pub const PRUNE_SNAPSHOT_LABEL: &str = "before_prune";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrunePolicy {
    /// Keep everything from the Nth-from-last message onward, tool calls
    /// included.
    Messages,
    /// Keep only the last N messages and drop every tool record. Breaks
    /// call/output pairing for anything that replays the log.
    Turns,
}

impl PrunePolicy {
    pub fn apply(self, entries: &[LogEntry], n: usize) -> PruneOutcome {
        match self {
            PrunePolicy::Messages => keep_last_messages(entries, n),
            PrunePolicy::Turns => keep_last_turns(entries, n),
        }
    }
}

impl std::str::FromStr for PrunePolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "messages" | "threaded" => Ok(PrunePolicy::Messages),
            "turns" => Ok(PrunePolicy::Turns),
            _ => Err(format!("invalid prune policy: {s}. Expected: messages, turns")),
        }
    }
}

/// What a policy would keep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneOutcome {
    pub original: usize,
    pub original_messages: usize,
    pub kept: usize,
    /// Index of the first retained record (threaded policy only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    #[serde(skip)]
    pub entries: Vec<LogEntry>,
}

fn message_indices(entries: &[LogEntry]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_message())
        .map(|(i, _)| i)
        .collect()
}

/// Keep every record from the Nth-from-last message onward. With fewer
/// than N messages the log is kept whole.
pub fn keep_last_messages(entries: &[LogEntry], n: usize) -> PruneOutcome {
    let n = n.max(1);
    let idxs = message_indices(entries);
    let start = if idxs.len() >= n { idxs[idxs.len() - n] } else { 0 };
    let kept: Vec<LogEntry> = entries[start..].to_vec();
    PruneOutcome {
        original: entries.len(),
        original_messages: idxs.len(),
        kept: kept.len(),
        start_index: Some(start),
        entries: kept,
    }
}

/// Keep only the last N message records; every other record is dropped.
pub fn keep_last_turns(entries: &[LogEntry], n: usize) -> PruneOutcome {
    let n = n.max(1);
    let messages: Vec<&LogEntry> = entries.iter().filter(|e| e.is_message()).collect();
    let skip = messages.len().saturating_sub(n);
    let kept: Vec<LogEntry> = messages.into_iter().skip(skip).cloned().collect();
    PruneOutcome {
        original: entries.len(),
        original_messages: skip + kept.len(),
        kept: kept.len(),
        start_index: None,
        entries: kept,
    }
}

/// Outcome of pruning the stored log.
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub policy: PrunePolicy,
    #[serde(flatten)]
    pub outcome: PruneOutcome,
    pub snapshot: PathBuf,
    pub rewritten: bool,
}

/// Snapshot the log, then rewrite it with what `policy` retains. The log is
/// left as-is when the policy keeps every record unchanged.
pub fn prune_log(
    log: &EventLog,
    archive: &Archive,
    policy: PrunePolicy,
    n: usize,
) -> Result<PruneReport> {
    let snapshot = archive.snapshot(log, PRUNE_SNAPSHOT_LABEL)?;
    let entries = log.read_all()?;
    let outcome = policy.apply(&entries, n);
    let rewritten = outcome.entries != entries;
    if rewritten {
        log.rewrite_all(&outcome.entries)?;
    }
    tracing::info!(
        ?policy,
        original = outcome.original,
        kept = outcome.kept,
        snapshot = %snapshot.path.display(),
        "pruned event log"
    );
    Ok(PruneReport {
        policy,
        outcome,
        snapshot: snapshot.path,
        rewritten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_core::Role;

    fn msg(role: Role, text: &str) -> LogEntry {
        LogEntry::message(role, text)
    }

    /// user, call, output, assistant: the four-record scenario.
    fn scenario() -> Vec<LogEntry> {
        vec![
            msg(Role::User, "hi"),
            LogEntry::function_call("search", "c1", "{}"),
            LogEntry::function_call_output("c1", "{}"),
            msg(Role::Assistant, "done"),
        ]
    }

    fn long_log() -> Vec<LogEntry> {
        let mut v = Vec::new();
        for i in 0..6 {
            v.push(msg(Role::User, &format!("q{i}")));
            v.push(LogEntry::function_call("search", format!("c{i}"), "{}"));
            v.push(LogEntry::function_call_output(format!("c{i}"), "[]"));
            v.push(msg(Role::Assistant, &format!("a{i}")));
        }
        v
    }

    #[test]
    fn keep_last_one_message_of_scenario() {
        let out = keep_last_messages(&scenario(), 1);
        assert_eq!(out.kept, 1);
        assert_eq!(out.start_index, Some(3));
        assert_eq!(out.entries, vec![msg(Role::Assistant, "done")]);
    }

    #[test]
    fn threaded_keeps_whole_log_when_short() {
        let log = scenario();
        let out = keep_last_messages(&log, 10);
        assert_eq!(out.kept, out.original);
        assert_eq!(out.entries, log);
    }

    #[test]
    fn threaded_start_is_nth_from_last_message() {
        let log = long_log();
        let idxs: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_message())
            .map(|(i, _)| i)
            .collect();
        for n in 1..=idxs.len() {
            let out = keep_last_messages(&log, n);
            let start = idxs[idxs.len() - n];
            assert_eq!(out.start_index, Some(start));
            assert_eq!(out.entries, log[start..].to_vec());
        }
    }

    #[test]
    fn threaded_keeps_tool_pairs_in_window() {
        let out = keep_last_messages(&long_log(), 2);
        let calls = out
            .entries
            .iter()
            .filter(|e| e.kind() == "function_call")
            .count();
        let outputs = out
            .entries
            .iter()
            .filter(|e| e.kind() == "function_call_output")
            .count();
        assert_eq!(calls, 1);
        assert_eq!(outputs, 1);
    }

    #[test]
    fn turns_keeps_only_messages() {
        let log = long_log();
        for n in [1, 3, 12, 50] {
            let out = keep_last_turns(&log, n);
            assert_eq!(out.kept, n.min(12));
            assert!(out.entries.iter().all(LogEntry::is_message));
            assert_eq!(out.original_messages, 12);
        }
        let out = keep_last_turns(&log, 2);
        assert_eq!(
            out.entries,
            vec![msg(Role::User, "q5"), msg(Role::Assistant, "a5")]
        );
    }

    #[test]
    fn empty_and_message_free_logs() {
        let out = keep_last_messages(&[], 5);
        assert_eq!((out.original, out.kept), (0, 0));
        let out = keep_last_turns(&[], 5);
        assert_eq!((out.original, out.kept), (0, 0));

        let tools = vec![
            LogEntry::function_call("search", "c1", "{}"),
            LogEntry::function_call_output("c1", "{}"),
        ];
        assert_eq!(keep_last_messages(&tools, 3).entries, tools);
        assert_eq!(keep_last_turns(&tools, 3).kept, 0);
    }

    #[test]
    fn zero_is_clamped_to_one() {
        assert_eq!(keep_last_messages(&scenario(), 0).kept, 1);
        assert_eq!(keep_last_turns(&scenario(), 0).kept, 1);
    }

    #[test]
    fn policy_parses() {
        assert_eq!("threaded".parse::<PrunePolicy>().unwrap(), PrunePolicy::Messages);
        assert_eq!("turns".parse::<PrunePolicy>().unwrap(), PrunePolicy::Turns);
        assert!("all".parse::<PrunePolicy>().is_err());
    }

    #[test]
    fn prune_log_snapshots_before_rewriting() {
        let tmp = tempfile::tempdir().unwrap();
        let log = EventLog::open(tmp.path().join("state/index.jsonl"));
        let archive = Archive::new(tmp.path().join("memory"));
        for e in scenario() {
            log.append(&e).unwrap();
        }
        let before = std::fs::read(log.path()).unwrap();

        let report = prune_log(&log, &archive, PrunePolicy::Messages, 1).unwrap();
        assert!(report.rewritten);
        assert_eq!(report.outcome.kept, 1);
        assert_eq!(std::fs::read(&report.snapshot).unwrap(), before);
        assert!(report
            .snapshot
            .to_string_lossy()
            .ends_with("_before_prune.jsonl"));
        assert_eq!(log.read_all().unwrap(), vec![msg(Role::Assistant, "done")]);
    }

    #[test]
    fn turns_counts_typed_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let log = EventLog::open(tmp.path().join("state/index.jsonl"));
        let archive = Archive::new(tmp.path().join("memory"));
        std::fs::create_dir_all(tmp.path().join("state")).unwrap();
        std::fs::write(
            log.path(),
            "{\"type\":\"message\",\"role\":\"user\",\"content\":\"hi\"}\n\
             {\"role\":\"assistant\",\"content\":\"yo\"}\n",
        )
        .unwrap();

        let report = prune_log(&log, &archive, PrunePolicy::Turns, 2).unwrap();
        assert_eq!(report.outcome.original_messages, 2);
        assert_eq!(report.outcome.kept, 2);
        assert_eq!(
            log.read_all().unwrap(),
            vec![msg(Role::User, "hi"), msg(Role::Assistant, "yo")]
        );
    }

    #[test]
    fn prune_log_leaves_short_log_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let log = EventLog::open(tmp.path().join("state/index.jsonl"));
        let archive = Archive::new(tmp.path().join("memory"));
        for e in scenario() {
            log.append(&e).unwrap();
        }
        let report = prune_log(&log, &archive, PrunePolicy::Messages, 10).unwrap();
        assert!(!report.rewritten);
        assert_eq!(log.read_all().unwrap(), scenario());
    }
}
