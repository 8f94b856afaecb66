use serde_json::Value;

use crate::error::EngineError;

/// Structured output reconstructed incrementally from a provider stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant-visible text.
    ContentDelta(String),
    /// A fragment of reasoning/thinking text.
    ReasoningDelta(String),
    /// A fully accumulated tool invocation, emitted once per block.
    ToolCallRequested {
        id: String,
        name: String,
        arguments: Value,
    },
    /// An explicit error frame from the provider.
    ErrorEvent(String),
    /// Terminal event: the stream finished cleanly.
    Completed,
}

/// Listener surface exposed to the rest of the application.
///
/// One method per event kind. Events arrive in stream order;
/// `on_complete`/`on_error` fire last and exactly once per request.
/// All methods default to no-ops so callers implement only what they need.
pub trait StreamHandler: Send {
    fn on_content(&mut self, _text: &str) {}
    fn on_reasoning(&mut self, _text: &str) {}
    fn on_tool_call(&mut self, _id: &str, _name: &str, _arguments: &Value) {}
    fn on_complete(&mut self) {}
    fn on_error(&mut self, _error: &EngineError) {}
}
