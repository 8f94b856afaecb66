use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Fine-grained classification of a network-level fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFault {
    Timeout,
    DnsFailure,
    ConnectionReset,
    ConnectionLost,
    HostUnreachable,
    Other,
}

impl TransportFault {
    /// Whether this fault is a transient condition worth retrying.
    pub fn is_transient(self) -> bool {
        !matches!(self, TransportFault::Other)
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportFault::Timeout => "timeout",
            TransportFault::DnsFailure => "dns failure",
            TransportFault::ConnectionReset => "connection reset",
            TransportFault::ConnectionLost => "connection lost",
            TransportFault::HostUnreachable => "host unreachable",
            TransportFault::Other => "transport fault",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{fault}: {message}")]
    Transport {
        fault: TransportFault,
        message: String,
    },

    #[error("upstream returned HTTP {status}: {message}")]
    HttpStatus {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed stream data: {0}")]
    Protocol(String),

    #[error("circuit open for {endpoint}, retry in {remaining:?}")]
    CircuitOpen {
        endpoint: String,
        remaining: Duration,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
