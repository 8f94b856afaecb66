pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::error::TransportFault;

/// Classify a reqwest failure into the transport fault taxonomy.
///
/// Walks the source chain looking for the underlying IO error; falls back
/// to reqwest's own coarse predicates.
pub(crate) fn classify_transport(err: &reqwest::Error) -> TransportFault {
    if err.is_timeout() {
        return TransportFault::Timeout;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return match io.kind() {
                std::io::ErrorKind::TimedOut => TransportFault::Timeout,
                std::io::ErrorKind::ConnectionReset => TransportFault::ConnectionReset,
                std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof => TransportFault::ConnectionLost,
                std::io::ErrorKind::HostUnreachable
                | std::io::ErrorKind::NetworkUnreachable => TransportFault::HostUnreachable,
                _ => TransportFault::Other,
            };
        }
        if cause.to_string().to_lowercase().contains("dns") {
            return TransportFault::DnsFailure;
        }
        source = cause.source();
    }
    if err.is_connect() {
        return TransportFault::ConnectionLost;
    }
    TransportFault::Other
}

/// Parses the `Retry-After` or `retry-after-ms` header from the response
///
/// Returns the duration to wait before retrying, capped at 60 seconds.
/// Returns `None` if the header is missing or malformed.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(v) = headers.get("retry-after-ms")
        && let Ok(s) = v.to_str()
        && let Ok(ms) = s.parse::<u64>()
    {
        return Some(Duration::from_millis(ms.min(60_000)));
    }

    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        return Some(Duration::from_secs(secs.min(60)));
    }

    None
}
