use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Identifies one upstream endpoint for failure isolation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Logical label distinguishing endpoints behind the same host.
    pub label: String,
}

impl EndpointKey {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        label: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            label: label.into(),
        }
    }

    pub fn from_url(url: &reqwest::Url, label: &str) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port_or_known_default().unwrap_or(0),
            label: label.to_string(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}#{}",
            self.scheme, self.host, self.port, self.label
        )
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit blocks requests.
    pub open_duration: Duration,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow; consecutive failures are counted.
    Closed,
    /// Requests blocked until the deadline passes.
    Open { until: Instant },
    /// Trial requests allowed; successes are counted.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

/// Per-endpoint three-state failure isolation.
///
/// The Open → HalfOpen transition happens lazily whenever state is read
/// after the deadline; there is no background timer.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
            }),
        }
    }

    fn refresh(inner: &mut BreakerInner) {
        if let CircuitState::Open { until } = inner.state
            && Instant::now() >= until
        {
            inner.state = CircuitState::HalfOpen;
            inner.consecutive_successes = 0;
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::refresh(&mut inner);
        inner.state
    }

    pub fn should_allow_request(&self) -> bool {
        !matches!(self.state(), CircuitState::Open { .. })
    }

    /// Remaining cooldown while open, `None` otherwise.
    pub fn open_remaining(&self) -> Option<Duration> {
        match self.state() {
            CircuitState::Open { until } => {
                Some(until.saturating_duration_since(Instant::now()))
            }
            _ => None,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    info!("circuit closed after successful trials");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Self::refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit opened after consecutive failures"
                    );
                    inner.state = CircuitState::Open {
                        until: Instant::now() + self.config.open_duration,
                    };
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            CircuitState::HalfOpen => {
                warn!("trial request failed, circuit reopened");
                inner.state = CircuitState::Open {
                    until: Instant::now() + self.config.open_duration,
                };
                inner.consecutive_failures = 0;
                inner.consecutive_successes = 0;
            }
            CircuitState::Open { .. } => {}
        }
    }
}

/// Lazily populated map of endpoint key → breaker.
///
/// Constructed explicitly and injected; safe under concurrent access from
/// multiple in-flight requests. Entries live for the registry's lifetime.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<EndpointKey, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn breaker(&self, key: &EndpointKey) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        debug!(endpoint = %key, "creating circuit breaker");
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
