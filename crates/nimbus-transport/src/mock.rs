//! Recording transport for tests
//!
//! Captures every request it is handed (streamed bodies are drained so the
//! recorded body is exactly what would have gone over the wire) and answers
//! with queued responses in FIFO order. With an empty queue it answers
//! `200` with an empty body.

use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, RequestBody, StreamingResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A request as seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Body bytes, fully collected
    pub body: Bytes,
    /// Whether the body arrived as a stream
    pub streamed: bool,
}

impl RecordedRequest {
    /// Get a header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

enum Queued {
    Response(HttpResponse),
    Error(TransportError),
}

/// Mock transport for testing the request pipeline without a network
///
/// Allows tests to:
/// - Queue responses or transport errors
/// - Inspect requests that were sent
/// - Simulate latency
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Requests that have been sent
    sent: Arc<Mutex<Vec<RecordedRequest>>>,

    /// Queued replies
    queue: Arc<Mutex<VecDeque<Queued>>>,

    /// Optional delay before replying
    delay: Option<Duration>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response
    pub async fn respond(&self, status: u16, body: impl Into<Bytes>) {
        self.respond_with(HttpResponse::new(status, HashMap::new(), body))
            .await;
    }

    /// Queue a fully specified response
    pub async fn respond_with(&self, response: HttpResponse) {
        self.queue.lock().await.push_back(Queued::Response(response));
    }

    /// Queue a transport failure
    pub async fn fail(&self, error: TransportError) {
        self.queue.lock().await.push_back(Queued::Error(error));
    }

    /// All requests sent so far
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.sent.lock().await.clone()
    }

    /// Number of requests sent so far
    pub async fn request_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    async fn record(&self, request: HttpRequest) -> Result<HttpResponse> {
        let streamed = request.body.is_stream();
        let body = match request.body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(bytes) => bytes,
            RequestBody::Stream(mut stream) => {
                let mut collected = Vec::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                Bytes::from(collected)
            }
        };

        self.sent.lock().await.push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
            streamed,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.queue.lock().await.pop_front() {
            Some(Queued::Response(response)) => Ok(response),
            Some(Queued::Error(err)) => Err(err),
            None => Ok(HttpResponse::new(200, HashMap::new(), Bytes::new())),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_http(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.record(request).await
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let response = self.record(request).await?;
        // Split into a few chunks so consumers see more than one item
        let chunks: Vec<Result<Bytes>> = response
            .body
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(StreamingResponse {
            status: response.status,
            headers: response.headers,
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }
}
