pub mod model;
pub mod openai;
pub mod session;
pub mod tools;

pub use model::{FunctionCall, ModelClient, ModelRequest, ModelResponse};
pub use openai::{OpenAiClient, OpenAiSummarizer};
pub use session::{load_instructions, ChatSession, DEFAULT_INSTRUCTIONS};
pub use tools::{tool_schemas, ToolRunner};
