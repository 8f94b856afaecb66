//! # LLM Stream Engine
//!
//! A streaming inference-protocol engine for large-language-model
//! completions.
//!
//! ## Overview
//!
//! This library consumes raw byte streams from two vendor wire formats:
//! - **Two-line SSE framing** (`event:`/`data:` pairs, Anthropic style)
//! - **Single-line JSON envelopes** (`data: <json>` chunks, OpenAI style)
//!
//! and incrementally reconstructs structured output: text deltas, reasoning
//! deltas and tool-call invocations split across many fragments. Every
//! network attempt is wrapped in a resilience layer:
//! - Retry with exponential backoff and jitter, which never re-issues a
//!   request once output has been delivered to the caller
//! - A per-endpoint circuit breaker that fails fast while an upstream is
//!   consistently unhealthy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_stream_engine::breaker::BreakerRegistry;
//! use llm_stream_engine::client::AnthropicClient;
//! use llm_stream_engine::models::{ChatMessage, CompletionRequest};
//! use llm_stream_engine::{EngineConfig, StreamHandler, StreamOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Printer;
//! impl StreamHandler for Printer {
//!     fn on_content(&mut self, text: &str) {
//!         print!("{text}");
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let transport = Arc::new(AnthropicClient::new(
//!     "https://api.anthropic.com",
//!     "sk-key".to_string(),
//! )?);
//! let registry = Arc::new(BreakerRegistry::new(config.breaker.clone()));
//! let orchestrator = StreamOrchestrator::new(transport, registry, config);
//!
//! let mut request = CompletionRequest::new("claude-sonnet-4-20250514");
//! request.messages.push(ChatMessage::user("Hello!"));
//!
//! let mut handler = Printer;
//! let outcome = orchestrator
//!     .execute(request, &mut handler, CancellationToken::new())
//!     .await?;
//! println!("\nfinished after {} attempt(s)", outcome.attempts);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`streaming`] - Frame reader, wire-format parsers and batching emitter
//! - [`retry`] - Retry policy and backoff calculator
//! - [`breaker`] - Per-endpoint circuit breakers and their registry
//! - [`orchestrator`] - Per-request composition of the above
//! - [`provider`] / [`client`] - Transport contract and vendor clients
//! - [`models`] - Request model and wire-format payload types
//! - [`config`] - Configuration loading and validation
//! - [`metrics`] - Engine-wide reliability counters

pub mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod streaming;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use orchestrator::{RequestState, StreamOrchestrator, StreamOutcome};
pub use streaming::{StreamEvent, StreamHandler, WireFormat};
