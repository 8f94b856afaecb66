use serde::Deserialize;
use serde_json::Value;

/// One `data:` payload from the two-line `event:`/`data:` wire format.
///
/// Dispatch happens on the embedded `type` tag; unrecognized event types
/// deserialize to `Unknown` and are ignored upstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDelta,
        #[serde(default)]
        usage: Option<UsageDelta>,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct MessageStart {
    pub id: String,
    #[serde(default)]
    pub usage: Option<UsageStart>,
}

#[derive(Debug, Deserialize)]
pub struct UsageStart {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Initial shape of a content block. Text may arrive as a plain string or as
/// nested typed blocks, hence the loose `Value` payloads.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockStart {
    Text {
        #[serde(default)]
        text: Value,
    },
    Thinking {
        #[serde(default)]
        thinking: Value,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        #[serde(default)]
        text: Value,
    },
    ThinkingDelta {
        #[serde(default)]
        thinking: Value,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    /// Opaque integrity signature over a thinking block; carried on the wire
    /// but not part of the reconstructed output.
    SignatureDelta {
        #[serde(default)]
        signature: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
