use std::collections::HashMap;

use serde_json::{Map, Value, json};
use tracing::warn;

use super::event::StreamEvent;

/// What kind of output a content block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Reasoning,
    ToolUse,
}

/// Per-block accumulation state, live from the block's start signal until
/// its stop signal. For tool-use blocks `buffer` collects the JSON argument
/// fragments in arrival order; it is parsed exactly once, at stop.
#[derive(Debug, Clone)]
pub struct BlockState {
    pub kind: BlockKind,
    pub buffer: String,
    pub tool_name: Option<String>,
    pub tool_id: Option<String>,
}

impl BlockState {
    pub fn text() -> Self {
        Self {
            kind: BlockKind::Text,
            buffer: String::new(),
            tool_name: None,
            tool_id: None,
        }
    }

    pub fn reasoning() -> Self {
        Self {
            kind: BlockKind::Reasoning,
            buffer: String::new(),
            tool_name: None,
            tool_id: None,
        }
    }

    pub fn tool_use(id: Option<String>, name: Option<String>) -> Self {
        Self {
            kind: BlockKind::ToolUse,
            buffer: String::new(),
            tool_name: name,
            tool_id: id,
        }
    }

    pub fn append(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }
}

/// Token accounting reported by the provider alongside the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Mutable decode state for one stream attempt.
///
/// Owned by exactly one attempt; created fresh per attempt and discarded on
/// completion, reset or abandonment. Never shared across attempts, so it
/// needs no synchronization.
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    /// Event name announced by an `event:` line, consumed by the next
    /// `data:` line (two-line framing only).
    pub pending_event: Option<String>,
    /// Live content blocks, keyed by wire index.
    pub active_blocks: HashMap<usize, BlockState>,
    pub message_id: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    /// Lines that failed to decode and were skipped.
    pub malformed_lines: u64,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalize the tool-use block at `index`, removing it from the live set.
    ///
    /// Returns `None` when the index is unknown or not a tool block. Parse
    /// failure of the accumulated buffer never aborts the stream: the call is
    /// surfaced with an error-tagged argument object instead.
    pub fn finish_tool_block(&mut self, index: usize) -> Option<StreamEvent> {
        let block = self.active_blocks.remove(&index)?;
        if block.kind != BlockKind::ToolUse {
            return None;
        }
        let name = block.tool_name.unwrap_or_default();
        let id = block.tool_id.unwrap_or_default();
        let arguments = parse_tool_arguments(&name, &block.buffer);
        Some(StreamEvent::ToolCallRequested {
            id,
            name,
            arguments,
        })
    }

    /// Indices of live tool-use blocks in ascending order.
    pub fn live_tool_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .active_blocks
            .iter()
            .filter(|(_, block)| block.kind == BlockKind::ToolUse)
            .map(|(&index, _)| index)
            .collect();
        indices.sort_unstable();
        indices
    }
}

/// Parse an accumulated tool-argument buffer into a JSON object.
///
/// An empty buffer means a no-argument call. Anything that is not a JSON
/// object becomes a synthetic argument map carrying the error and the raw
/// text, so the caller still sees the invocation.
fn parse_tool_arguments(name: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => {
            warn!(tool = %name, "tool arguments were not a JSON object");
            json!({
                "error": format!("tool arguments were not a JSON object: {other}"),
                "raw": raw,
            })
        }
        Err(e) => {
            warn!(tool = %name, error = %e, "failed to parse tool arguments");
            json!({
                "error": format!("invalid tool arguments: {e}"),
                "raw": raw,
            })
        }
    }
}

/// Collect every leaf text field from a content value.
///
/// Providers send content either as a plain string or as arrays of typed
/// blocks, nested to arbitrary depth. Unknown block shapes are skipped, not
/// fatal.
pub fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text") {
                collect_text(text, out);
            } else if let Some(content) = map.get("content") {
                collect_text(content, out);
            }
        }
        _ => {}
    }
}
