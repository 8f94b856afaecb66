use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::breaker::BreakerRegistry;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result, TransportFault};
use crate::metrics::EngineMetrics;
use crate::models::CompletionRequest;
use crate::provider::{ByteStream, Transport};
use crate::retry::{ErrorKind, retry_delay, should_retry};
use crate::streaming::{
    BatchingEmitter, FrameReader, ParserState, StreamEvent, StreamHandler, StreamParser, Usage,
};

/// Lifecycle of one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Sending,
    Streaming,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

/// Summary of a completed stream.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub request_id: Uuid,
    pub message_id: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    /// Attempts issued, including the successful one.
    pub attempts: u32,
}

/// How one stream attempt ended.
enum AttemptEnd {
    Completed { state: ParserState },
    ProviderError { message: String },
    Failed { error: EngineError, delivered: bool },
    Cancelled,
}

/// Outcome of dispatching one parser event to the handler.
enum Dispatch {
    Continue,
    ProviderError(String),
    Completed,
}

/// Composes breaker gate, transport, frame reader, parser and emitter for
/// each request, and decides retry versus surface on failure.
///
/// One orchestrator serves any number of concurrent requests; per-request
/// state lives on the stack of `execute`. Only the breaker registry is
/// shared.
pub struct StreamOrchestrator {
    transport: Arc<dyn Transport>,
    registry: Arc<BreakerRegistry>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl StreamOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<BreakerRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Share a metrics instance across orchestrators.
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Run one logical request to completion, retrying transient failures.
    ///
    /// Events reach `handler` in arrival order; `on_complete`/`on_error`
    /// fire last and exactly once. Cancellation suppresses all further
    /// callbacks and is surfaced only through the returned error.
    pub async fn execute(
        &self,
        request: CompletionRequest,
        handler: &mut dyn StreamHandler,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome> {
        request.validate()?;

        let request_id = Uuid::new_v4();
        let endpoint = self.transport.endpoint();
        let breaker = self.registry.breaker(&endpoint);
        self.metrics.record_request_start();
        let mut state = RequestState::Idle;
        let mut attempt: u32 = 0;
        debug!(%request_id, ?state, endpoint = %endpoint, "request accepted");

        loop {
            if cancel.is_cancelled() {
                state = RequestState::Cancelled;
                debug!(%request_id, ?state, "cancelled before send");
                self.metrics.record_cancellation();
                return Err(EngineError::Cancelled);
            }

            if !breaker.should_allow_request() {
                let remaining = breaker.open_remaining().unwrap_or_default();
                self.metrics.record_breaker_rejection();
                warn!(%request_id, endpoint = %endpoint, ?remaining, "circuit open, failing fast");
                let err = EngineError::CircuitOpen {
                    endpoint: endpoint.to_string(),
                    remaining,
                };
                handler.on_error(&err);
                self.metrics.record_request_failure();
                return Err(err);
            }

            state = RequestState::Sending;
            debug!(%request_id, attempt, transport = self.transport.name(), ?state, "opening stream");

            let opened = tokio::select! {
                _ = cancel.cancelled() => {
                    self.metrics.record_cancellation();
                    return Err(EngineError::Cancelled);
                }
                result = self.transport.open_stream(&request) => result,
            };

            let mut emitter = BatchingEmitter::new(self.config.emitter.clone());
            let end = match opened {
                Ok(response) => {
                    state = RequestState::Streaming;
                    debug!(%request_id, status = response.status, ?state, "consuming stream");
                    self.run_attempt(response.stream, &mut emitter, handler, &cancel)
                        .await
                }
                Err(error) => AttemptEnd::Failed {
                    error,
                    delivered: false,
                },
            };

            match end {
                AttemptEnd::Completed { state: parsed } => {
                    state = RequestState::Completed;
                    breaker.record_success();
                    self.metrics.record_request_complete();
                    handler.on_complete();
                    info!(
                        %request_id,
                        ?state,
                        attempts = attempt + 1,
                        stop_reason = parsed.stop_reason.as_deref().unwrap_or("none"),
                        "stream completed"
                    );
                    return Ok(StreamOutcome {
                        request_id,
                        message_id: parsed.message_id,
                        stop_reason: parsed.stop_reason,
                        usage: parsed.usage,
                        attempts: attempt + 1,
                    });
                }
                AttemptEnd::ProviderError { message } => {
                    state = RequestState::Failed;
                    breaker.record_failure();
                    let err = EngineError::Provider(message);
                    error!(%request_id, ?state, error = %err, "provider reported an error frame");
                    handler.on_error(&err);
                    self.metrics.record_request_failure();
                    return Err(err);
                }
                AttemptEnd::Cancelled => {
                    state = RequestState::Cancelled;
                    debug!(%request_id, ?state, "cancelled mid-stream");
                    self.metrics.record_cancellation();
                    return Err(EngineError::Cancelled);
                }
                AttemptEnd::Failed { error, delivered } => {
                    breaker.record_failure();
                    let kind = ErrorKind::of(&error);
                    if should_retry(kind, attempt, delivered, &self.config.retry) {
                        // Nothing reached the caller, so the next attempt
                        // starts clean; pending batched text goes with it.
                        emitter.discard();
                        state = RequestState::Retrying;
                        let retry_after = match &error {
                            EngineError::HttpStatus { retry_after, .. } => *retry_after,
                            _ => None,
                        };
                        let delay = retry_delay(attempt, retry_after, &self.config.retry);
                        self.metrics.record_retry();
                        info!(%request_id, ?state, attempt, ?delay, cause = %error, "retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                self.metrics.record_cancellation();
                                return Err(EngineError::Cancelled);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                        continue;
                    }

                    state = RequestState::Failed;
                    emitter.flush(handler);
                    let err = if attempt > 0 {
                        EngineError::RetriesExhausted {
                            attempts: attempt + 1,
                            source: Box::new(error),
                        }
                    } else {
                        error
                    };
                    error!(%request_id, ?state, error = %err, "stream failed");
                    handler.on_error(&err);
                    self.metrics.record_request_failure();
                    return Err(err);
                }
            }
        }
    }

    /// Drive one attempt's bytes through reader → parser → emitter.
    async fn run_attempt(
        &self,
        mut stream: ByteStream,
        emitter: &mut BatchingEmitter,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> AttemptEnd {
        let mut reader = FrameReader::new();
        let mut parser: Box<dyn StreamParser> = self.transport.wire_format().new_parser();
        let mut delivered = false;

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    emitter.discard();
                    return AttemptEnd::Cancelled;
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(chunk)) => {
                    for line in reader.push(&chunk) {
                        for event in parser.parse_line(&line) {
                            match self.dispatch(event, emitter, handler, &mut delivered) {
                                Dispatch::Continue => {}
                                Dispatch::ProviderError(message) => {
                                    self.metrics
                                        .record_malformed_lines(parser.state().malformed_lines);
                                    return AttemptEnd::ProviderError { message };
                                }
                                Dispatch::Completed => {
                                    self.metrics
                                        .record_malformed_lines(parser.state().malformed_lines);
                                    return AttemptEnd::Completed {
                                        state: parser.take_state(),
                                    };
                                }
                            }
                        }
                    }
                }
                Some(Err(error)) => {
                    self.metrics
                        .record_malformed_lines(parser.state().malformed_lines);
                    return AttemptEnd::Failed { error, delivered };
                }
                None => {
                    for event in parser.finish() {
                        match self.dispatch(event, emitter, handler, &mut delivered) {
                            Dispatch::Continue => {}
                            Dispatch::ProviderError(message) => {
                                self.metrics
                                    .record_malformed_lines(parser.state().malformed_lines);
                                return AttemptEnd::ProviderError { message };
                            }
                            Dispatch::Completed => {
                                self.metrics
                                    .record_malformed_lines(parser.state().malformed_lines);
                                return AttemptEnd::Completed {
                                    state: parser.take_state(),
                                };
                            }
                        }
                    }
                    self.metrics
                        .record_malformed_lines(parser.state().malformed_lines);
                    return AttemptEnd::Failed {
                        error: EngineError::Transport {
                            fault: TransportFault::ConnectionLost,
                            message: "stream ended before completion".to_string(),
                        },
                        delivered,
                    };
                }
            }
        }
    }

    fn dispatch(
        &self,
        event: StreamEvent,
        emitter: &mut BatchingEmitter,
        handler: &mut dyn StreamHandler,
        delivered: &mut bool,
    ) -> Dispatch {
        match event {
            StreamEvent::ContentDelta(text) => {
                *delivered |= emitter.push_content(&text, handler);
                Dispatch::Continue
            }
            StreamEvent::ReasoningDelta(text) => {
                *delivered |= emitter.push_reasoning(&text, handler);
                Dispatch::Continue
            }
            StreamEvent::ToolCallRequested {
                id,
                name,
                arguments,
            } => {
                // Flush batched text first so the handler sees everything
                // that preceded the call.
                emitter.flush(handler);
                handler.on_tool_call(&id, &name, &arguments);
                self.metrics.record_tool_call();
                *delivered = true;
                Dispatch::Continue
            }
            StreamEvent::ErrorEvent(message) => {
                *delivered |= emitter.flush(handler);
                Dispatch::ProviderError(message)
            }
            StreamEvent::Completed => {
                *delivered |= emitter.flush(handler);
                Dispatch::Completed
            }
        }
    }
}
