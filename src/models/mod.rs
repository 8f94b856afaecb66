pub mod anthropic;
pub mod openai;
pub mod request;

pub use request::{ChatMessage, CompletionRequest, ToolDefinition};
