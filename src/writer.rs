//! Response writers.
//!
//! Handlers and middleware never build a hyper response directly. They write
//! through the request's active [`ResponseWriter`], which is what lets a
//! middleware stage substitute a decorating writer (see
//! [`TeeWriter`](crate::tee::TeeWriter)) without any handler noticing.
//!
//! The writer that talks to the client is [`HttpWriter`]:
//!
//! ```text
//! handler ── write() ──▶ HttpWriter ──(first write / flush / drop)──▶ head channel ──▶ hyper
//!                             └──────── body chunks ──▶ mpsc ──▶ ResponseBody ──▶ hyper
//! ```
//!
//! The head (status + headers) is committed exactly once. After that,
//! status and header changes are ignored.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body::Frame;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Status line and headers, handed to hyper once committed.
pub(crate) type Head = (StatusCode, HeaderMap);

/// A heap-allocated writer, as stored in the per-request context.
pub type BoxWriter = Box<dyn ResponseWriter>;

/// The response side of one request.
///
/// Body bytes go through [`io::Write`]. Everything else (status, headers,
/// commit state) is explicit here so decorators can delegate it.
pub trait ResponseWriter: io::Write + Send {
    /// The status that was, or will be, sent. Defaults to `200 OK`.
    fn status(&self) -> StatusCode;

    /// Sets the response status. No effect once the head is committed.
    fn set_status(&mut self, status: StatusCode);

    fn headers(&self) -> &HeaderMap;

    /// Mutable headers. Changes after commit never reach the client.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Whether the head has been sent.
    fn is_committed(&self) -> bool;

    /// Number of body bytes accepted so far.
    fn written(&self) -> usize;
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for Box<W> {
    fn status(&self) -> StatusCode { (**self).status() }
    fn set_status(&mut self, status: StatusCode) { (**self).set_status(status) }
    fn headers(&self) -> &HeaderMap { (**self).headers() }
    fn headers_mut(&mut self) -> &mut HeaderMap { (**self).headers_mut() }
    fn is_committed(&self) -> bool { (**self).is_committed() }
    fn written(&self) -> usize { (**self).written() }
}

// ── HttpWriter ────────────────────────────────────────────────────────────────

/// The writer connected to the real client.
///
/// Writes never block: each chunk is queued for hyper immediately, so a
/// handler that produces data faster than the client reads it holds the
/// backlog in memory until the connection drains or closes. Handlers
/// streaming large bodies should pace themselves, for example by yielding
/// between chunks.
pub struct HttpWriter {
    status: StatusCode,
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    chunks: mpsc::UnboundedSender<Bytes>,
    written: usize,
}

impl HttpWriter {
    /// Creates a writer together with the receiving ends hyper needs: the
    /// head, resolved on commit, and the streaming body.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Head>, ResponseBody) {
        let (head_tx, head_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let writer = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head: Some(head_tx),
            chunks: chunk_tx,
            written: 0,
        };
        (writer, head_rx, ResponseBody { chunks: chunk_rx })
    }

    fn commit(&mut self) {
        if let Some(head) = self.head.take() {
            // The receiver is gone only when the connection already closed.
            let _ = head.send((self.status, self.headers.clone()));
        }
    }
}

impl io::Write for HttpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit();
        if buf.is_empty() {
            return Ok(0);
        }
        self.chunks
            .send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl ResponseWriter for HttpWriter {
    fn status(&self) -> StatusCode { self.status }

    fn set_status(&mut self, status: StatusCode) {
        if self.is_committed() {
            debug!(current = %self.status, ignored = %status, "status change after headers were sent");
            return;
        }
        self.status = status;
    }

    fn headers(&self) -> &HeaderMap { &self.headers }
    fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    fn is_committed(&self) -> bool { self.head.is_none() }
    fn written(&self) -> usize { self.written }
}

impl Drop for HttpWriter {
    /// Commits whatever head is pending so hyper always gets a response.
    /// A request task that panics before committing answers `500`.
    fn drop(&mut self) {
        if !self.is_committed() && std::thread::panicking() {
            self.status = StatusCode::INTERNAL_SERVER_ERROR;
        }
        self.commit();
    }
}

// ── ResponseBody ──────────────────────────────────────────────────────────────

/// Streaming body fed by an [`HttpWriter`]. Ends when the writer is dropped.
#[derive(Debug)]
pub struct ResponseBody {
    chunks: mpsc::UnboundedReceiver<Bytes>,
}

impl http_body::Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.chunks
            .poll_recv(cx)
            .map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}
