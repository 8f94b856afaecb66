pub mod anthropic;
pub mod emitter;
pub mod event;
pub mod frame;
pub mod openai;
pub mod state;

pub use anthropic::AnthropicStreamParser;
pub use emitter::{BatchingEmitter, EmitterConfig};
pub use event::{StreamEvent, StreamHandler};
pub use frame::FrameReader;
pub use openai::OpenAiStreamParser;
pub use state::{BlockKind, BlockState, ParserState, Usage};

/// Which vendor framing a byte stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Two-line `event:`/`data:` SSE framing.
    Anthropic,
    /// Single-line `data: <json>` chunks terminated by `data: [DONE]`.
    OpenAi,
}

impl WireFormat {
    /// A fresh parser for one stream attempt.
    pub fn new_parser(self) -> Box<dyn StreamParser> {
        match self {
            WireFormat::Anthropic => Box::new(AnthropicStreamParser::new()),
            WireFormat::OpenAi => Box::new(OpenAiStreamParser::new()),
        }
    }
}

/// Line-oriented decoder turning wire text into [`StreamEvent`]s.
///
/// One instance owns one attempt's [`ParserState`]; a retry starts over
/// with a new parser.
pub trait StreamParser: Send {
    /// Decode one line, producing zero or more events.
    fn parse_line(&mut self, line: &str) -> Vec<StreamEvent>;

    /// Signal end of input; may produce trailing events.
    fn finish(&mut self) -> Vec<StreamEvent>;

    fn state(&self) -> &ParserState;

    /// Move the state out, e.g. to build the request outcome.
    fn take_state(&mut self) -> ParserState;
}
