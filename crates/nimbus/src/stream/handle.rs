//! The handle returned by [`Client::request`](crate::Client::request)

use super::buffer::StreamBuffer;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};

/// Writer type accepted as a download destination.
pub type DownloadTarget = Box<dyn AsyncWrite + Send + Unpin>;

/// Status and headers of a completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lower-cased
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful response.
///
/// When the body was streamed to a download destination, `body` is empty.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Response body
    pub body: Bytes,
    /// Status and headers
    pub response: ResponseHead,
}

impl Reply {
    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::Streaming(format!("response body is not UTF-8: {e}")))
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Shared slot for the download destination.
///
/// A streamed download waits until the slot is settled: a destination was
/// given, or the handle was awaited or dropped without one.
#[derive(Clone)]
pub(crate) struct DownloadSlot {
    target: Arc<Mutex<Option<DownloadTarget>>>,
    settled: Arc<watch::Sender<bool>>,
}

impl Default for DownloadSlot {
    fn default() -> Self {
        Self {
            target: Arc::default(),
            settled: Arc::new(watch::channel(false).0),
        }
    }
}

impl DownloadSlot {
    pub(crate) fn set(&self, target: DownloadTarget) {
        *self.target.lock().unwrap_or_else(|e| e.into_inner()) = Some(target);
        self.settle();
    }

    pub(crate) fn take(&self) -> Option<DownloadTarget> {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// No destination will be given after this.
    pub(crate) fn settle(&self) {
        self.settled.send_replace(true);
    }

    /// Wait until [`settle`](Self::settle) or [`set`](Self::set).
    pub(crate) async fn settled(&self) {
        let mut rx = self.settled.subscribe();
        let _ = rx.wait_for(|settled| *settled).await;
    }
}

impl fmt::Debug for DownloadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSlot")
            .field("settled", &*self.settled.borrow())
            .finish_non_exhaustive()
    }
}

/// Settles the download slot when the handle goes away.
#[derive(Debug)]
struct SettleOnDrop(DownloadSlot);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.0.settle();
    }
}

/// Upload side of a request that was dispatched without waiting.
///
/// Requests without an upload body have no buffer and reject writes.
#[derive(Clone, Default)]
pub struct LiveBody {
    body: Option<StreamBuffer>,
}

impl LiveBody {
    pub(crate) fn new(body: Option<StreamBuffer>) -> Self {
        Self { body }
    }

    fn open(&self) -> Result<&StreamBuffer> {
        self.body.as_ref().ok_or_else(|| {
            Error::Streaming("request has no open upload body".to_string())
        })
    }

    fn write(&self, chunk: Bytes) -> Result<()> {
        self.open()?.write(chunk)
    }

    fn end(&self) {
        if let Some(body) = &self.body {
            body.end();
        }
    }

    async fn pipe_from<R>(&self, reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.open()?.pipe_from(reader).await
    }
}

/// The writable side of an in-flight request.
#[derive(Clone)]
pub enum RequestStream {
    /// Held behind the auth gate
    Buffered(StreamBuffer),
    /// Dispatched directly
    Live(LiveBody),
}

/// Write/end/pipe surface of an in-flight request. Clones share the request.
#[derive(Clone)]
pub struct RequestWriter {
    body: RequestStream,
    download: DownloadSlot,
}

impl RequestWriter {
    pub(crate) fn new(body: RequestStream, download: DownloadSlot) -> Self {
        Self { body, download }
    }

    /// The upload side.
    pub fn body(&self) -> &RequestStream {
        &self.body
    }

    /// The auth-gate buffer, when the request is held behind it.
    pub fn buffer(&self) -> Option<&StreamBuffer> {
        match &self.body {
            RequestStream::Buffered(buffer) => Some(buffer),
            RequestStream::Live(_) => None,
        }
    }

    /// Whether the request is waiting behind the auth gate.
    pub fn is_buffered(&self) -> bool {
        self.buffer().is_some()
    }

    /// Write a chunk of the upload body.
    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<()> {
        match &self.body {
            RequestStream::Buffered(buffer) => buffer.write(chunk),
            RequestStream::Live(live) => live.write(chunk.into()),
        }
    }

    /// Finish the upload body.
    pub fn end(&self) {
        match &self.body {
            RequestStream::Buffered(buffer) => buffer.end(),
            RequestStream::Live(live) => live.end(),
        }
    }

    /// Copy `reader` into the upload body, then end it.
    pub async fn pipe_from<R>(&self, reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        match &self.body {
            RequestStream::Buffered(buffer) => buffer.pipe_from(reader).await,
            RequestStream::Live(live) => live.pipe_from(reader).await,
        }
    }

    /// Stream a successful download response into `target`.
    ///
    /// The download waits for this until the [`RequestHandle`] is awaited or
    /// dropped. After that the body is collected into the [`Reply`] instead.
    pub fn pipe_to(&self, target: impl AsyncWrite + Send + Unpin + 'static) {
        self.download.set(Box::new(target));
    }
}

impl fmt::Debug for RequestWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            RequestStream::Buffered(buffer) => f
                .debug_tuple("RequestWriter::Buffered")
                .field(buffer)
                .finish(),
            RequestStream::Live(_) => f.write_str("RequestWriter::Live"),
        }
    }
}

/// Handle to an in-flight request.
///
/// Returned synchronously; the exchange runs on a spawned task. Write and
/// pipe through the handle, then await [`outcome`](Self::outcome) or hand
/// continuations to [`then`](Self::then).
#[derive(Debug)]
pub struct RequestHandle {
    writer: RequestWriter,
    outcome: oneshot::Receiver<Result<Reply>>,
    _settle: SettleOnDrop,
}

impl RequestHandle {
    pub(crate) fn new(writer: RequestWriter, outcome: oneshot::Receiver<Result<Reply>>) -> Self {
        let settle = SettleOnDrop(writer.download.clone());
        Self {
            writer,
            outcome,
            _settle: settle,
        }
    }

    /// The writable side of the request.
    pub fn writer(&self) -> &RequestWriter {
        &self.writer
    }

    /// Whether the request is waiting behind the auth gate.
    pub fn is_buffered(&self) -> bool {
        self.writer.is_buffered()
    }

    /// The auth-gate buffer, when the request is held behind it.
    pub fn buffer(&self) -> Option<&StreamBuffer> {
        self.writer.buffer()
    }

    /// Write a chunk of the upload body.
    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.writer.write(chunk)
    }

    /// Finish the upload body.
    pub fn end(&self) {
        self.writer.end()
    }

    /// Copy `reader` into the upload body, then end it.
    pub async fn pipe_from<R>(&self, reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.writer.pipe_from(reader).await
    }

    /// Stream a successful download response into `target`.
    pub fn pipe_to(&self, target: impl AsyncWrite + Send + Unpin + 'static) {
        self.writer.pipe_to(target)
    }

    /// Wait for the request to finish.
    ///
    /// # Errors
    ///
    /// Whatever the pipeline produced: a transport failure, an auth failure,
    /// a provider error from the fail-code table, or [`Error::Streaming`]
    /// when the request task went away without reporting.
    pub async fn outcome(self) -> Result<Reply> {
        self.writer.download.settle();
        self.outcome.await.unwrap_or_else(|_| {
            Err(Error::Streaming(
                "request task ended without a result".to_string(),
            ))
        })
    }

    /// Run `errback` or `callback` when the request finishes.
    ///
    /// Exactly one of them runs, once. Returns the writer so the caller can
    /// keep streaming; a download destination must be given before this.
    pub fn then<E, C>(self, errback: E, callback: C) -> RequestWriter
    where
        E: FnOnce(Error) + Send + 'static,
        C: FnOnce(Bytes, ResponseHead) + Send + 'static,
    {
        let writer = self.writer.clone();
        tokio::spawn(async move {
            match self.outcome().await {
                Ok(reply) => callback(reply.body, reply.response),
                Err(e) => errback(e),
            }
        });
        writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn head(status: u16) -> ResponseHead {
        ResponseHead {
            status,
            headers: HashMap::from([("Content-Type".to_string(), "text/plain".to_string())]),
        }
    }

    #[test]
    fn test_reply_accessors() {
        let reply = Reply {
            body: Bytes::from_static(br#"{"ok":true}"#),
            response: head(200),
        };
        assert_eq!(reply.text().unwrap(), r#"{"ok":true}"#);
        let value: serde_json::Value = reply.json().unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(reply.response.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_outcome_when_task_vanishes() {
        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle::new(
            RequestWriter::new(RequestStream::Live(LiveBody::default()), DownloadSlot::default()),
            rx,
        );
        drop(tx);
        assert_matches!(handle.outcome().await, Err(Error::Streaming(_)));
    }

    #[tokio::test]
    async fn test_then_runs_callback_once() {
        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle::new(
            RequestWriter::new(RequestStream::Live(LiveBody::default()), DownloadSlot::default()),
            rx,
        );
        let (done_tx, done_rx) = oneshot::channel();
        handle.then(
            |_| panic!("errback must not run"),
            move |body, head| {
                let _ = done_tx.send((body, head.status));
            },
        );

        tx.send(Ok(Reply {
            body: Bytes::from_static(b"done"),
            response: head(201),
        }))
        .unwrap();
        let (body, status) = done_rx.await.unwrap();
        assert_eq!(body, Bytes::from_static(b"done"));
        assert_eq!(status, 201);
    }

    #[tokio::test]
    async fn test_then_runs_errback() {
        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle::new(
            RequestWriter::new(RequestStream::Live(LiveBody::default()), DownloadSlot::default()),
            rx,
        );
        let (done_tx, done_rx) = oneshot::channel();
        handle.then(
            move |e| {
                let _ = done_tx.send(e.to_string());
            },
            |_, _| panic!("callback must not run"),
        );

        tx.send(Err(Error::Auth("denied".into()))).unwrap();
        assert!(done_rx.await.unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn test_slot_settles_on_pipe_outcome_or_drop() {
        let writer = || {
            RequestWriter::new(RequestStream::Live(LiveBody::default()), DownloadSlot::default())
        };

        let piped = writer();
        let slot = piped.download.clone();
        piped.pipe_to(tokio::io::sink());
        slot.settled().await;
        assert!(slot.take().is_some());

        let (_tx, rx) = oneshot::channel();
        let dropped = RequestHandle::new(writer(), rx);
        let slot = dropped.writer.download.clone();
        assert!(!*slot.settled.borrow());
        drop(dropped);
        slot.settled().await;
        assert!(slot.take().is_none());

        let (tx, rx) = oneshot::channel();
        let awaited = RequestHandle::new(writer(), rx);
        let slot = awaited.writer.download.clone();
        let outcome = tokio::spawn(awaited.outcome());
        slot.settled().await;
        drop(tx);
        assert_matches!(outcome.await.unwrap(), Err(Error::Streaming(_)));
    }

    #[tokio::test]
    async fn test_live_body_pipes_from_reader() {
        let buffer = StreamBuffer::new();
        let stream = buffer.body_stream();
        buffer.connect();
        let writer = RequestWriter::new(
            RequestStream::Live(LiveBody::new(Some(buffer))),
            DownloadSlot::default(),
        );

        assert_eq!(writer.pipe_from(&b"live bytes"[..]).await.unwrap(), 10);
        let body: Vec<Bytes> = futures::StreamExt::collect::<Vec<_>>(stream)
            .await
            .into_iter()
            .map(|chunk| chunk.unwrap())
            .collect();
        assert_eq!(body.concat(), b"live bytes");
    }

    #[test]
    fn test_live_body_without_upload_rejects_writes() {
        let writer =
            RequestWriter::new(RequestStream::Live(LiveBody::default()), DownloadSlot::default());
        assert!(!writer.is_buffered());
        assert_matches!(writer.write("x"), Err(Error::Streaming(_)));
    }
}
