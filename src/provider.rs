use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::breaker::EndpointKey;
use crate::error::Result;
use crate::models::CompletionRequest;
use crate::streaming::WireFormat;

/// Type alias for the byte stream yielded by a transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Type alias for the future returned by open_stream
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send>>;

/// A successfully opened provider stream.
pub struct TransportResponse {
    /// HTTP status of the accepted request (2xx).
    pub status: u16,
    pub stream: ByteStream,
}

/// Trait for transports that open streaming completion connections
///
/// Non-success HTTP statuses are returned as errors carrying the status and
/// any server-supplied retry-after hint, so the resilience layer can make
/// its decision without touching vendor specifics.
pub trait Transport: Send + Sync {
    /// Open a streaming connection for the given request
    fn open_stream(&self, request: &CompletionRequest) -> TransportFuture;

    /// The wire format this transport's byte stream speaks
    fn wire_format(&self) -> WireFormat;

    /// Breaker key identifying the upstream endpoint
    fn endpoint(&self) -> EndpointKey;

    /// Get the transport name for logging
    fn name(&self) -> &str;
}
