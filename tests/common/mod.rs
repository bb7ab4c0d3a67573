#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http_body::Frame;
use http_body_util::{BodyExt, Full};
use tollgate::audit::{AuditSink, RequestRecord, ResponseRecord};
use tollgate::{Pipeline, Request, Response};

pub const CLIENT: &str = "192.0.2.10:40100";

/// Audit sink that keeps every record in memory.
#[derive(Default)]
pub struct Recorder {
    pub requests: Mutex<Vec<RequestRecord>>,
    pub responses: Mutex<Vec<ResponseRecord>>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<ResponseRecord> {
        self.responses.lock().unwrap().clone()
    }
}

impl AuditSink for Recorder {
    fn record_request(&self, record: RequestRecord) {
        self.requests.lock().unwrap().push(record);
    }

    fn record_response(&self, record: ResponseRecord) {
        self.responses.lock().unwrap().push(record);
    }
}

/// Access-log sink collecting lines.
pub fn line_collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    (lines, move |line: &str| sink_lines.lock().unwrap().push(line.to_owned()))
}

/// Collects formatted `tracing` output while the returned guard is alive.
///
/// The subscriber is the thread's default, so the pipeline must run on the
/// test's own thread (the default current-thread test runtime).
pub fn capture_logs() -> (Arc<Mutex<Vec<u8>>>, tracing::subscriber::DefaultGuard) {
    let logs = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&logs);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || LogWriter(Arc::clone(&out)))
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

pub fn logged(logs: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&logs.lock().unwrap()).into_owned()
}

struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// A body whose first read fails.
pub struct FailingBody;

impl http_body::Body for FailingBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::ConnectionAborted, "peer reset mid-body"))))
    }
}

pub fn client_addr() -> SocketAddr {
    CLIENT.parse().unwrap()
}

pub fn post(path: &str, body: impl Into<Bytes>) -> Request {
    let req = http::Request::post(path).body(Full::new(body.into())).unwrap();
    Request::from_http(req, client_addr())
}

pub fn without_body(method: http::Method, path: &str) -> Request {
    let (parts, ()) = http::Request::builder()
        .method(method)
        .uri(path)
        .body(())
        .unwrap()
        .into_parts();
    Request::from_parts(parts, None, client_addr())
}

/// Runs `request` through `pipeline` and collects the full response.
pub async fn send(pipeline: &Arc<Pipeline>, request: Request) -> (http::StatusCode, http::HeaderMap, Bytes) {
    let response = Arc::clone(pipeline).respond(request).await;
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, bytes)
}

/// Echoes the request body back.
pub async fn echo(mut req: Request) -> Response {
    match req.bytes().await {
        Ok(body) => Response::builder()
            .bytes(tollgate::ContentType::OctetStream, body.to_vec()),
        Err(_) => Response::status(http::StatusCode::BAD_REQUEST),
    }
}
