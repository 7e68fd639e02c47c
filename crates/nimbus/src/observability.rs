//! Structured logging for the request pipeline
//!
//! Every dispatched request is logged through this layer so field names stay
//! consistent: `provider`, `method`, `url`, `status`, `elapsed_ms`.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Request metadata for structured logging
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// Provider name
    pub provider: String,
    /// HTTP method (GET, PUT, etc.)
    pub method: String,
    /// Resolved request URL
    pub url: String,
    /// Request body size in bytes, when known up front
    pub body_size: Option<usize>,
    /// Whether the body is streamed
    pub streamed: bool,
}

impl RequestMetadata {
    /// Create new request metadata
    pub fn new(
        provider: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            method: method.into(),
            url: url.into(),
            body_size: None,
            streamed: false,
        }
    }

    /// Set the request body size
    pub fn with_body_size(mut self, size: Option<usize>) -> Self {
        self.body_size = size;
        self
    }

    /// Mark the body as streamed
    pub fn streamed(mut self, streamed: bool) -> Self {
        self.streamed = streamed;
        self
    }

    /// Log request being sent
    pub fn log_request(&self) {
        debug!(
            provider = %self.provider,
            method = %self.method,
            url = %self.url,
            body_size = self.body_size,
            streamed = self.streamed,
            "Sending request"
        );
    }
}

/// Response metadata for structured logging
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: u16,
    /// Response body size in bytes (optional)
    pub body_size: Option<usize>,
    /// Time elapsed for the request
    pub elapsed: Duration,
}

impl ResponseMetadata {
    /// Create new response metadata
    pub fn new(status: u16, elapsed: Duration) -> Self {
        Self {
            status,
            body_size: None,
            elapsed,
        }
    }

    /// Set the response body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Log successful response
    pub fn log_success(&self, request: &RequestMetadata) {
        info!(
            provider = %request.provider,
            method = %request.method,
            url = %request.url,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis(),
            body_size = self.body_size,
            "Request succeeded"
        );
    }

    /// Log a response classified as a provider failure
    pub fn log_error(&self, request: &RequestMetadata, error: &str) {
        warn!(
            provider = %request.provider,
            method = %request.method,
            url = %request.url,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis(),
            error = %error,
            "Request failed"
        );
    }
}

/// Timer for measuring request duration
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Log a transport-level failure (no response was received)
pub fn log_transport_error(request: &RequestMetadata, elapsed: Duration, error: &str) {
    warn!(
        provider = %request.provider,
        method = %request.method,
        url = %request.url,
        elapsed_ms = elapsed.as_millis(),
        error = %error,
        "Request could not be delivered"
    );
}

/// Install a `tracing` subscriber reading `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "trace")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nimbus=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
