use tracing::warn;

use crate::models::openai::ChatChunk;

use super::StreamParser;
use super::event::StreamEvent;
use super::state::{BlockState, ParserState, collect_text};

/// End-of-stream sentinel on the chunk wire.
const DONE_SENTINEL: &str = "[DONE]";

/// Decoder for the single-line `data: <json>` chunk wire format.
///
/// Tool calls on this wire have no per-block stop event; fragments keyed by
/// `tool_calls[].index` accumulate until the choice reports a
/// `finish_reason` (or the `[DONE]` sentinel arrives), which finalizes
/// every live call in index order.
pub struct OpenAiStreamParser {
    state: ParserState,
    finished: bool,
}

impl OpenAiStreamParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::new(),
            finished: false,
        }
    }

    fn parse_chunk(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(StreamEvent::ErrorEvent(error.message));
            return events;
        }

        if let Some(usage) = chunk.usage {
            self.state.usage.input_tokens = usage.prompt_tokens;
            self.state.usage.output_tokens = usage.completion_tokens;
        }

        for choice in chunk.choices {
            if let Some(content) = &choice.delta.content {
                let mut out = String::new();
                collect_text(content, &mut out);
                if !out.is_empty() {
                    events.push(StreamEvent::ContentDelta(out));
                }
            }

            if let Some(reasoning) = choice.delta.reasoning_value() {
                let mut out = String::new();
                collect_text(reasoning, &mut out);
                if !out.is_empty() {
                    events.push(StreamEvent::ReasoningDelta(out));
                }
            }

            for tc in choice.delta.tool_calls {
                let block = self
                    .state
                    .active_blocks
                    .entry(tc.index)
                    .or_insert_with(|| BlockState::tool_use(None, None));
                if let Some(id) = tc.id {
                    block.tool_id = Some(id);
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        block.tool_name = Some(name);
                    }
                    if let Some(fragment) = function.arguments {
                        block.append(&fragment);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.state.stop_reason = Some(reason);
                events.extend(self.finalize_tool_calls());
            }
        }

        events
    }

    fn finalize_tool_calls(&mut self) -> Vec<StreamEvent> {
        self.state
            .live_tool_indices()
            .into_iter()
            .filter_map(|index| self.state.finish_tool_block(index))
            .collect()
    }
}

impl StreamParser for OpenAiStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<StreamEvent> {
        if line.is_empty() || self.finished {
            return Vec::new();
        }
        let Some(data) = line.strip_prefix("data:") else {
            // comments and keep-alive markers
            return Vec::new();
        };
        let data = data.trim();

        if data == DONE_SENTINEL {
            self.finished = true;
            let mut events = self.finalize_tool_calls();
            events.push(StreamEvent::Completed);
            return events;
        }

        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => self.parse_chunk(chunk),
            Err(e) => {
                self.state.malformed_lines += 1;
                warn!(error = %e, "skipping undecodable chunk line");
                Vec::new()
            }
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        // Some backends close the connection after the final finish_reason
        // without sending the sentinel; treat that as a clean end.
        if !self.finished && self.state.stop_reason.is_some() {
            self.finished = true;
            let mut events = self.finalize_tool_calls();
            events.push(StreamEvent::Completed);
            return events;
        }
        Vec::new()
    }

    fn state(&self) -> &ParserState {
        &self.state
    }

    fn take_state(&mut self) -> ParserState {
        std::mem::take(&mut self.state)
    }
}

impl Default for OpenAiStreamParser {
    fn default() -> Self {
        Self::new()
    }
}
