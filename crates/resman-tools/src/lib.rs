pub mod claude_code;
pub mod command;
pub mod context;
pub mod files;
pub mod pdf;
pub mod redact;
pub mod scholar;

pub use claude_code::{RunError, RunOptions, RunOutcome};
pub use command::{dispatch, Command, CommandEnv};
pub use context::ToolContext;
pub use pdf::{PdfTextExtractor, PdftotextExtractor};
pub use redact::redact_secrets;
pub use scholar::{FullText, ScholarClient, ScholarError};
