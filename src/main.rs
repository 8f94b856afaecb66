use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use llm_stream_engine::breaker::BreakerRegistry;
use llm_stream_engine::client::{AnthropicClient, OpenAiClient};
use llm_stream_engine::models::{ChatMessage, CompletionRequest};
use llm_stream_engine::provider::Transport;
use llm_stream_engine::{EngineConfig, StreamHandler, StreamOrchestrator};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Anthropic,
    Openai,
}

/// Stream a completion from an inference endpoint to stdout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Wire format spoken by the endpoint
    #[arg(long, value_enum, default_value_t = Format::Anthropic)]
    format: Format,

    /// Base URL of the endpoint
    #[arg(long)]
    endpoint: String,

    /// Model to request
    #[arg(long)]
    model: String,

    /// Optional system prompt
    #[arg(long)]
    system: Option<String>,

    /// Optional TOML config file for retry/breaker/emitter tuning
    #[arg(long)]
    config: Option<String>,

    /// Prompt text
    prompt: String,
}

struct StdoutHandler;

impl StreamHandler for StdoutHandler {
    fn on_content(&mut self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn on_reasoning(&mut self, text: &str) {
        eprint!("{text}");
        let _ = std::io::stderr().flush();
    }

    fn on_tool_call(&mut self, id: &str, name: &str, arguments: &Value) {
        println!();
        println!("[tool call {id}] {name}({arguments})");
    }

    fn on_complete(&mut self) {
        println!();
    }

    fn on_error(&mut self, error: &llm_stream_engine::EngineError) {
        eprintln!("\nerror: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    config.validate()?;

    let api_key = std::env::var("LLM_API_KEY").context("LLM_API_KEY not set")?;

    let transport: Arc<dyn Transport> = match args.format {
        Format::Anthropic => Arc::new(AnthropicClient::new(&args.endpoint, api_key)?),
        Format::Openai => Arc::new(OpenAiClient::new(&args.endpoint, api_key)?),
    };

    let registry = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let orchestrator = StreamOrchestrator::new(transport, registry, config);

    let mut request = CompletionRequest::new(&args.model);
    request.system = args.system.clone();
    request.messages.push(ChatMessage::user(&args.prompt));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let metrics = orchestrator.metrics();
    let mut handler = StdoutHandler;
    let outcome = orchestrator.execute(request, &mut handler, cancel).await?;

    info!(
        attempts = outcome.attempts,
        stop_reason = outcome.stop_reason.as_deref().unwrap_or("none"),
        input_tokens = outcome.usage.input_tokens,
        output_tokens = outcome.usage.output_tokens,
        "done"
    );
    info!("{}", metrics.snapshot());

    Ok(())
}
