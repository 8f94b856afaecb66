use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{EngineError, Result};

/// Provider-neutral completion request.
///
/// Serialized into the vendor body shape by the transport that sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub messages: Vec<ChatMessage>,

    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            max_tokens: None,
            temperature: None,
            tools: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(EngineError::InvalidRequest("model is empty".to_string()));
        }
        if self.messages.is_empty() {
            return Err(EngineError::InvalidRequest(
                "no messages provided".to_string(),
            ));
        }
        if let Some(max_tokens) = self.max_tokens
            && max_tokens == 0
        {
            return Err(EngineError::InvalidRequest(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(EngineError::InvalidRequest(format!(
                "temperature {t} out of range"
            )));
        }
        Ok(())
    }

    /// Body for the two-line event-stream endpoint (messages API shape).
    pub fn to_event_stream_body(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
            "max_tokens": self.max_tokens.unwrap_or(4096),
            "stream": true,
        });
        if let Some(system) = &self.system {
            body["system"] = json!(system);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(tools) = &self.tools
            && !tools.is_empty()
        {
            body["tools"] = json!(tools);
        }
        body
    }

    /// Body for the single-line chunk endpoint (chat-completions shape).
    /// System prompts become a leading system message and tools are wrapped
    /// in the `function` envelope that wire expects.
    pub fn to_chat_completions_body(&self) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &self.messages {
            messages.push(json!({"role": message.role, "content": message.content}));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(tools) = &self.tools
            && !tools.is_empty()
        {
            let wrapped: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(wrapped);
        }
        body
    }
}
