pub mod archive;
pub mod log;
pub mod prune;

pub use archive::{Archive, SnapshotInfo};
pub use log::EventLog;
pub use prune::{prune_log, PruneOutcome, PrunePolicy, PruneReport};
