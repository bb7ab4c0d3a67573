//! Tee writer: duplicates a response into an in-memory buffer.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

use crate::writer::ResponseWriter;

/// Handle to the buffer a [`TeeWriter`] fills.
///
/// The handle is independent of where the tee ends up in the writer stack:
/// a stage that installs a tee keeps its handle, and later stages may wrap
/// the tee in further decorators without hiding the capture from it.
#[derive(Clone, Debug)]
pub struct Capture {
    buf: Arc<Mutex<Option<BytesMut>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self { buf: Arc::new(Mutex::new(Some(BytesMut::new()))) }
    }

    /// Copy of the bytes captured so far; empty once taken.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().as_deref().map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// Takes the captured bytes. Returns `None` if already taken; every tee
    /// sharing this handle passes writes straight through afterwards.
    pub fn take(&self) -> Option<Bytes> {
        self.lock().take().map(BytesMut::freeze)
    }

    fn append(&self, bytes: &[u8]) {
        if let Some(buf) = self.lock().as_mut() {
            buf.extend_from_slice(bytes);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<BytesMut>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Capture {
    fn default() -> Self { Self::new() }
}

/// Wraps a [`ResponseWriter`] and keeps a copy of every body byte it accepts.
///
/// The wrapped writer stays the source of truth: write results, status,
/// headers and commit state all come from it unchanged. Only the bytes the
/// inner writer reports as written are captured, so after a short or failed
/// write the buffer still equals what actually went to the client.
///
/// The bytes are read through the [`Capture`] handle, which stays valid
/// however many decorators are stacked on top of the tee.
pub struct TeeWriter<W> {
    inner: W,
    capture: Capture,
}

impl<W: ResponseWriter> TeeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capture(inner, Capture::new())
    }

    /// A tee that fills an existing handle.
    pub fn with_capture(inner: W, capture: Capture) -> Self {
        Self { inner, capture }
    }

    pub fn capture(&self) -> Capture { self.capture.clone() }

    /// Bytes captured so far; empty once the capture has been taken.
    pub fn captured(&self) -> Vec<u8> { self.capture.snapshot() }

    pub fn get_ref(&self) -> &W { &self.inner }

    pub fn into_inner(self) -> W { self.inner }
}

impl<W: ResponseWriter> io::Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.capture.append(&buf[..n.min(buf.len())]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: ResponseWriter> ResponseWriter for TeeWriter<W> {
    fn status(&self) -> StatusCode { self.inner.status() }
    fn set_status(&mut self, status: StatusCode) { self.inner.set_status(status) }
    fn headers(&self) -> &HeaderMap { self.inner.headers() }
    fn headers_mut(&mut self) -> &mut HeaderMap { self.inner.headers_mut() }
    fn is_committed(&self) -> bool { self.inner.is_committed() }
    fn written(&self) -> usize { self.inner.written() }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::writer::BoxWriter;

    /// In-memory client that accepts at most `limit` bytes per write call.
    struct Client {
        received: Vec<u8>,
        limit: usize,
        fail: bool,
        status: StatusCode,
        headers: HeaderMap,
    }

    impl Client {
        fn new(limit: usize) -> Self {
            Self {
                received: Vec::new(),
                limit,
                fail: false,
                status: StatusCode::OK,
                headers: HeaderMap::new(),
            }
        }
    }

    impl io::Write for Client {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            let n = buf.len().min(self.limit);
            self.received.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    impl ResponseWriter for Client {
        fn status(&self) -> StatusCode { self.status }
        fn set_status(&mut self, status: StatusCode) { self.status = status }
        fn headers(&self) -> &HeaderMap { &self.headers }
        fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
        fn is_committed(&self) -> bool { !self.received.is_empty() }
        fn written(&self) -> usize { self.received.len() }
    }

    #[test]
    fn client_and_capture_see_the_same_bytes_in_order() {
        let mut tee = TeeWriter::new(Client::new(usize::MAX));
        for chunk in ["data: {\"id\":1}\n\n", "data: {\"id\":2}\n\n", "", "data: [DONE]\n\n"] {
            tee.write_all(chunk.as_bytes()).unwrap();
        }

        let expected = b"data: {\"id\":1}\n\ndata: {\"id\":2}\n\ndata: [DONE]\n\n";
        assert_eq!(tee.get_ref().received, expected);
        assert_eq!(tee.captured(), expected);
        assert_eq!(tee.capture().take().unwrap(), Bytes::from_static(expected));
    }

    #[test]
    fn short_writes_capture_only_accepted_bytes() {
        let mut tee = TeeWriter::new(Client::new(3));
        assert_eq!(tee.write(b"abcdef").unwrap(), 3);
        assert_eq!(tee.captured(), b"abc");

        tee.write_all(b"ghij").unwrap();
        assert_eq!(tee.get_ref().received, b"abcghij");
        assert_eq!(tee.captured(), b"abcghij");
    }

    #[test]
    fn failed_write_is_returned_and_not_captured() {
        let mut client = Client::new(usize::MAX);
        client.fail = true;
        let mut tee = TeeWriter::new(client);

        let err = tee.write(b"lost").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(tee.captured().is_empty());
    }

    #[test]
    fn status_and_headers_delegate_to_inner() {
        let mut tee = TeeWriter::new(Client::new(usize::MAX));
        tee.set_status(StatusCode::TOO_MANY_REQUESTS);
        tee.headers_mut().insert("retry-after", "3".parse().unwrap());

        let client = tee.into_inner();
        assert_eq!(client.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(client.headers["retry-after"], "3");
    }

    #[test]
    fn passes_through_after_capture_is_taken() {
        let mut tee = TeeWriter::new(Client::new(usize::MAX));
        tee.write_all(b"first").unwrap();
        assert_eq!(tee.capture().take().unwrap(), Bytes::from_static(b"first"));
        assert!(tee.capture().take().is_none());

        tee.write_all(b"second").unwrap();
        assert!(tee.captured().is_empty());
        assert_eq!(tee.get_ref().received, b"firstsecond");
    }

    #[test]
    fn handle_sees_writes_through_outer_decorators() {
        let capture = Capture::new();
        let tee = TeeWriter::with_capture(Client::new(usize::MAX), capture.clone());
        let inner: BoxWriter = Box::new(tee);
        let mut outer: BoxWriter = Box::new(inner);
        outer.write_all(b"wrapped twice").unwrap();

        assert_eq!(capture.snapshot(), b"wrapped twice");
        assert_eq!(capture.take().unwrap(), Bytes::from_static(b"wrapped twice"));
    }
}
