use tracing::{debug, warn};

use crate::models::anthropic::{BlockDelta, ContentBlockStart, EventPayload};

use super::StreamParser;
use super::event::StreamEvent;
use super::state::{BlockState, ParserState, collect_text};

/// Decoder for the two-line `event:`/`data:` wire format.
///
/// Stateful across lines: an `event:` line parks its name in the pending
/// slot, the following `data:` line carries the JSON payload. Dispatch uses
/// the payload's own `type` tag, so a missing `event:` line is harmless.
pub struct AnthropicStreamParser {
    state: ParserState,
}

impl AnthropicStreamParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::new(),
        }
    }

    fn parse_payload(&mut self, payload: EventPayload) -> Vec<StreamEvent> {
        match payload {
            EventPayload::MessageStart { message } => {
                self.state.message_id = Some(message.id);
                if let Some(usage) = message.usage {
                    self.state.usage.input_tokens = usage.input_tokens;
                    self.state.usage.output_tokens = usage.output_tokens;
                }
                Vec::new()
            }
            EventPayload::ContentBlockStart {
                index,
                content_block,
            } => {
                let mut events = Vec::new();
                match content_block {
                    ContentBlockStart::Text { text } => {
                        self.state.active_blocks.insert(index, BlockState::text());
                        let mut initial = String::new();
                        collect_text(&text, &mut initial);
                        if !initial.is_empty() {
                            events.push(StreamEvent::ContentDelta(initial));
                        }
                    }
                    ContentBlockStart::Thinking { thinking } => {
                        self.state
                            .active_blocks
                            .insert(index, BlockState::reasoning());
                        let mut initial = String::new();
                        collect_text(&thinking, &mut initial);
                        if !initial.is_empty() {
                            events.push(StreamEvent::ReasoningDelta(initial));
                        }
                    }
                    ContentBlockStart::ToolUse { id, name } => {
                        self.state
                            .active_blocks
                            .insert(index, BlockState::tool_use(Some(id), Some(name)));
                    }
                    ContentBlockStart::Unknown => {
                        debug!(index, "ignoring unknown content block type");
                    }
                }
                events
            }
            EventPayload::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => {
                    let mut out = String::new();
                    collect_text(&text, &mut out);
                    if out.is_empty() {
                        Vec::new()
                    } else {
                        vec![StreamEvent::ContentDelta(out)]
                    }
                }
                BlockDelta::ThinkingDelta { thinking } => {
                    let mut out = String::new();
                    collect_text(&thinking, &mut out);
                    if out.is_empty() {
                        Vec::new()
                    } else {
                        vec![StreamEvent::ReasoningDelta(out)]
                    }
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(block) = self.state.active_blocks.get_mut(&index) {
                        block.append(&partial_json);
                    } else {
                        warn!(index, "argument fragment for unknown block");
                    }
                    Vec::new()
                }
                BlockDelta::SignatureDelta { .. } | BlockDelta::Unknown => Vec::new(),
            },
            EventPayload::ContentBlockStop { index } => {
                match self.state.finish_tool_block(index) {
                    Some(event) => vec![event],
                    None => {
                        // Text and reasoning blocks just close.
                        self.state.active_blocks.remove(&index);
                        Vec::new()
                    }
                }
            }
            EventPayload::MessageDelta { delta, usage } => {
                if let Some(stop_reason) = delta.stop_reason {
                    self.state.stop_reason = Some(stop_reason);
                }
                if let Some(usage) = usage {
                    self.state.usage.output_tokens = usage.output_tokens;
                }
                Vec::new()
            }
            EventPayload::MessageStop => vec![StreamEvent::Completed],
            EventPayload::Ping => Vec::new(),
            EventPayload::Error { error } => vec![StreamEvent::ErrorEvent(error.message)],
            EventPayload::Unknown => Vec::new(),
        }
    }
}

impl StreamParser for AnthropicStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<StreamEvent> {
        if line.is_empty() {
            return Vec::new();
        }
        if let Some(name) = line.strip_prefix("event:") {
            self.state.pending_event = Some(name.trim().to_string());
            return Vec::new();
        }
        let Some(data) = line.strip_prefix("data:") else {
            // SSE comments and unknown fields (`: keep-alive`, `id:`, ...)
            return Vec::new();
        };
        let data = data.trim();

        let pending = self.state.pending_event.take();
        if pending.as_deref() == Some("ping") {
            return Vec::new();
        }

        match serde_json::from_str::<EventPayload>(data) {
            Ok(payload) => self.parse_payload(payload),
            Err(e) => {
                self.state.malformed_lines += 1;
                warn!(error = %e, event_type = pending.as_deref().unwrap_or(""), "skipping undecodable data line");
                Vec::new()
            }
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }

    fn state(&self) -> &ParserState {
        &self.state
    }

    fn take_state(&mut self) -> ParserState {
        std::mem::take(&mut self.state)
    }
}

impl Default for AnthropicStreamParser {
    fn default() -> Self {
        Self::new()
    }
}
