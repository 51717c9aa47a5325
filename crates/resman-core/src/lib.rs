pub mod brief;
pub mod canon;
pub mod entry;
pub mod error;
pub mod hash;
pub mod value;

pub use brief::{Brief, BriefMeta, BriefMetaMap, BriefMap};
pub use entry::{LogEntry, Role};
pub use error::LedgerError;
pub use value::ToolValue;
