//! Holding buffer for upload data written before the request exists
//!
//! While a gated request waits for authentication, the caller already has a
//! handle and may start writing. [`StreamBuffer`] queues those writes and,
//! once the outgoing request body is connected, feeds them to it in arrival
//! order followed by later writes. Before that point the queue is unbounded;
//! after it, [`StreamBuffer::pipe_from`] is paced by the network.
//!
//! Two flags describe the buffer and are independent of each other:
//! `attached` (a producer has started feeding it) and `ended` (the producer
//! is done). A third, `responded`, is set by the pipeline when the HTTP
//! exchange has completed; until then an end signal only sets the flag and
//! is not forwarded to [`on_end`](StreamBuffer::on_end) listeners.

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use nimbus_transport::BodyStream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Notify, oneshot};

/// Queued bytes above which [`StreamBuffer::pipe_from`] waits for the
/// request body to catch up. Only applies once the body is connected.
pub const HIGH_WATER_MARK: usize = 256 * 1024;

const READ_CHUNK: usize = 64 * 1024;

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Where the buffer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferState {
    /// A producer has attached
    pub attached: bool,
    /// The producer signalled end of data
    pub ended: bool,
    /// The HTTP exchange completed
    pub responded: bool,
    /// Total bytes written so far
    pub size: usize,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<Bytes>,
    queued: usize,
    size: usize,
    attached: bool,
    ended: bool,
    responded: bool,
    end_forwarded: bool,
    connected: bool,
    body_dropped: bool,
    ready: Vec<ReadyCallback>,
    end_listeners: Vec<oneshot::Sender<()>>,
}

impl Inner {
    fn forward_end(&mut self) {
        self.end_forwarded = true;
        for listener in self.end_listeners.drain(..) {
            let _ = listener.send(());
        }
    }
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    // Body side waits here for data or end
    readable: Notify,
    // Producers wait here for the queue to drain
    drained: Notify,
}

enum Next {
    Chunk(Bytes),
    Done,
    Wait,
}

/// Per-request upload buffer. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct StreamBuffer {
    shared: Arc<Shared>,
}

impl StreamBuffer {
    /// A fresh, unattached buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the flags and byte count.
    pub fn state(&self) -> BufferState {
        let inner = self.lock();
        BufferState {
            attached: inner.attached,
            ended: inner.ended,
            responded: inner.responded,
            size: inner.size,
        }
    }

    /// Bytes written so far.
    pub fn size(&self) -> usize {
        self.lock().size
    }

    /// Whether a producer has attached.
    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    /// Whether the producer has ended.
    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Record that a producer is feeding this buffer.
    ///
    /// The first call runs the callbacks registered with
    /// [`on_ready`](Self::on_ready). Later calls do nothing.
    pub fn attach(&self) {
        let callbacks = {
            let mut inner = self.lock();
            if inner.attached {
                return;
            }
            inner.attached = true;
            std::mem::take(&mut inner.ready)
        };
        tracing::trace!(callbacks = callbacks.len(), "stream buffer attached");
        for callback in callbacks {
            callback();
        }
    }

    /// Run `callback` once a producer has attached.
    ///
    /// Runs immediately when already attached. Callbacks still pending when
    /// the exchange completes are dropped without running.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut inner = self.lock();
            if inner.responded {
                return;
            }
            if !inner.attached {
                inner.ready.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Queue a chunk for the request body. Writing attaches the buffer.
    ///
    /// Never waits: the chunk is queued even above [`HIGH_WATER_MARK`].
    /// Use [`pipe_from`](Self::pipe_from) for sources that should be paced
    /// by the network.
    ///
    /// # Errors
    ///
    /// Fails after [`end`](Self::end), or when the outgoing body has been
    /// dropped by the transport.
    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.attach();
        let chunk = chunk.into();
        {
            let mut inner = self.lock();
            if inner.ended {
                return Err(Error::Streaming("write after end".to_string()));
            }
            if inner.body_dropped {
                return Err(Error::Streaming("request body closed".to_string()));
            }
            if chunk.is_empty() {
                return Ok(());
            }
            inner.size += chunk.len();
            inner.queued += chunk.len();
            inner.queue.push_back(chunk);
        }
        self.shared.readable.notify_one();
        Ok(())
    }

    /// Signal end of data. Ending attaches the buffer.
    ///
    /// The outgoing body finishes once the queue is drained. The end event
    /// itself reaches [`on_end`](Self::on_end) listeners only once the
    /// exchange has completed; before that it is held back.
    pub fn end(&self) {
        self.attach();
        {
            let mut inner = self.lock();
            if inner.ended {
                return;
            }
            inner.ended = true;
            if inner.responded {
                inner.forward_end();
            } else {
                tracing::trace!(size = inner.size, "end held until response");
            }
        }
        self.shared.readable.notify_one();
    }

    /// Resolves when the end event is forwarded.
    pub fn on_end(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();
        if inner.end_forwarded {
            let _ = tx.send(());
        } else {
            inner.end_listeners.push(tx);
        }
        rx
    }

    /// Copy everything from `reader` into the buffer, then end it.
    ///
    /// Once the body is connected, reading pauses while more than
    /// [`HIGH_WATER_MARK`] bytes wait to be sent. Before that everything is
    /// queued. Returns the number of bytes copied.
    pub async fn pipe_from<R>(&self, mut reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.attach();
        let mut total = 0u64;
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            self.wait_for_room().await?;
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            self.write(Bytes::copy_from_slice(&chunk[..n]))?;
            total += n as u64;
        }
        self.end();
        Ok(total)
    }

    async fn wait_for_room(&self) -> Result<()> {
        loop {
            let drained = self.shared.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            if self.has_room()? {
                return Ok(());
            }
            drained.await;
        }
    }

    fn has_room(&self) -> Result<bool> {
        let inner = self.lock();
        if inner.body_dropped {
            return Err(Error::Streaming("request body closed".to_string()));
        }
        Ok(!inner.connected || inner.queued < HIGH_WATER_MARK)
    }

    /// The outgoing request body.
    ///
    /// Yields nothing until [`connect`](Self::connect), then the queued
    /// chunks in order, and finishes once the buffer has ended and drained.
    /// Dropping the stream makes later writes fail.
    pub(crate) fn body_stream(&self) -> BodyStream {
        futures::stream::unfold(BodyReader(self.clone()), |reader| async move {
            let chunk = reader.next_chunk().await?;
            Some((Ok(chunk), reader))
        })
        .boxed()
    }

    /// Start feeding the request body.
    pub(crate) fn connect(&self) {
        {
            let mut inner = self.lock();
            inner.connected = true;
            tracing::trace!(
                queued = inner.queued,
                ended = inner.ended,
                "stream buffer connected"
            );
        }
        self.shared.readable.notify_one();
    }

    fn take_next(&self) -> Next {
        let next = {
            let mut inner = self.lock();
            if !inner.connected {
                Next::Wait
            } else if let Some(chunk) = inner.queue.pop_front() {
                inner.queued -= chunk.len();
                Next::Chunk(chunk)
            } else if inner.ended {
                Next::Done
            } else {
                Next::Wait
            }
        };
        if matches!(next, Next::Chunk(_)) {
            self.shared.drained.notify_waiters();
        }
        next
    }

    /// Record that the exchange completed.
    ///
    /// Forwards a held end event and drops pending ready callbacks.
    pub(crate) fn mark_responded(&self) {
        let mut inner = self.lock();
        inner.responded = true;
        inner.ready.clear();
        if inner.ended && !inner.end_forwarded {
            inner.forward_end();
        }
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("state", &self.state())
            .finish()
    }
}

/// Consumer side of [`StreamBuffer::body_stream`].
struct BodyReader(StreamBuffer);

impl BodyReader {
    async fn next_chunk(&self) -> Option<Bytes> {
        loop {
            match self.0.take_next() {
                Next::Chunk(chunk) => return Some(chunk),
                Next::Done => return None,
                Next::Wait => self.0.shared.readable.notified().await,
            }
        }
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.0.lock().body_dropped = true;
        self.0.shared.drained.notify_waiters();
    }
}
