use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters for stream reliability
///
/// Thread-safe atomic counters shared across concurrent requests.
#[derive(Default)]
pub struct EngineMetrics {
    /// Requests handed to the orchestrator
    pub requests_started: AtomicU64,

    /// Requests that reached a clean completion
    pub requests_completed: AtomicU64,

    /// Requests that surfaced an error
    pub requests_failed: AtomicU64,

    /// Requests cut short by cancellation
    pub requests_cancelled: AtomicU64,

    /// Attempts re-issued after a transient failure
    pub retries: AtomicU64,

    /// Requests rejected by an open circuit
    pub breaker_rejections: AtomicU64,

    /// Tool-call events delivered to handlers
    pub tool_calls: AtomicU64,

    /// Wire lines skipped as undecodable
    pub malformed_lines: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_start(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_complete(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancellation(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_rejection(&self) {
        self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_lines(&self, count: u64) {
        if count > 0 {
            self.malformed_lines.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_started: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub requests_cancelled: u64,
    pub retries: u64,
    pub breaker_rejections: u64,
    pub tool_calls: u64,
    pub malformed_lines: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Streams: {} started, {} completed, {} failed, {} cancelled; {} retries, {} breaker rejections, {} tool calls, {} malformed lines",
            self.requests_started,
            self.requests_completed,
            self.requests_failed,
            self.requests_cancelled,
            self.retries,
            self.breaker_rejections,
            self.tool_calls,
            self.malformed_lines,
        )
    }
}
