use std::time::Duration;

use rand::Rng;

use crate::error::{EngineError, TransportFault};

/// Upper bound on the random jitter added to computed backoff delays.
pub const JITTER_CEILING: Duration = Duration::from_millis(100);

/// Upper bound honored for server-supplied retry-after hints.
pub const RETRY_AFTER_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Classified failure cause, the sole input the retry decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport(TransportFault),
    Http(u16),
    Protocol,
    Provider,
    Cancelled,
    Other,
}

impl ErrorKind {
    pub fn of(error: &EngineError) -> Self {
        match error {
            EngineError::Transport { fault, .. } => ErrorKind::Transport(*fault),
            EngineError::HttpStatus { status, .. } => ErrorKind::Http(*status),
            EngineError::Protocol(_) | EngineError::Json(_) => ErrorKind::Protocol,
            EngineError::Provider(_) => ErrorKind::Provider,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::RetriesExhausted { source, .. } => ErrorKind::of(source),
            _ => ErrorKind::Other,
        }
    }
}

/// Pure retry decision.
///
/// The `has_received_data` rule is absolute: once any output reached the
/// caller during this attempt, a retry would duplicate it, so the answer is
/// no regardless of error kind or remaining budget.
pub fn should_retry(
    kind: ErrorKind,
    attempt: u32,
    has_received_data: bool,
    config: &RetryConfig,
) -> bool {
    if attempt >= config.max_retries {
        return false;
    }
    if has_received_data {
        return false;
    }
    match kind {
        ErrorKind::Cancelled => false,
        ErrorKind::Transport(fault) => fault.is_transient(),
        ErrorKind::Http(status) => status == 429 || (500..=599).contains(&status),
        ErrorKind::Protocol | ErrorKind::Provider | ErrorKind::Other => false,
    }
}

/// Delay before re-issuing attempt `attempt` (0-based).
///
/// A server-supplied retry-after hint wins, capped at [`RETRY_AFTER_CAP`].
/// Otherwise exponential backoff capped at `max_delay`, plus uniform jitter
/// so concurrent clients do not retry in lockstep.
pub fn retry_delay(attempt: u32, retry_after: Option<Duration>, config: &RetryConfig) -> Duration {
    if let Some(after) = retry_after {
        return after.min(RETRY_AFTER_CAP);
    }
    let factor = 1u32 << attempt.min(16);
    let base = config.initial_delay.saturating_mul(factor).min(config.max_delay);
    base + rand::thread_rng().gen_range(Duration::ZERO..JITTER_CEILING)
}
