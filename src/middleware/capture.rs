//! Request and response capture for audit records.
//!
//! Both stages move through the same three states per request:
//!
//! ```text
//! Idle ──(stage entered)──▶ Capturing ──(record handed to sink)──▶ Forwarded
//! ```
//!
//! `Forwarded` is reached at most once. Nothing is retried.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use http::StatusCode;
use tracing::error;

use crate::audit::{AuditSink, RequestRecord, ResponseRecord};
use crate::body::Body;
use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::tee::{Capture, TeeWriter};

/// Reads the whole request body into memory and records it.
///
/// The body is replaced by a fresh stream over the same bytes, so handlers
/// further down read exactly what the client sent. If the body cannot be
/// read, the request ends here with `500` and nothing is recorded.
pub struct RequestCapture {
    sink: Arc<dyn AuditSink>,
}

impl RequestCapture {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for RequestCapture {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let body = match ctx.request_mut().take_body() {
                None => Bytes::new(),
                Some(stream) => match stream.into_bytes().await {
                    Ok(bytes) => {
                        ctx.request_mut().set_body(Body::from(bytes.clone()));
                        bytes
                    }
                    Err(e) => {
                        error!(request_id = ctx.request_id().unwrap_or_default(), "request body read error: {e}");
                        ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
                        return;
                    }
                },
            };

            let record = RequestRecord::new(ctx.request_id().unwrap_or_default(), ctx.request(), body);
            self.sink.record_request(record);

            next.run(ctx).await;
        })
    }
}

/// Tees the response body into a buffer and records it once the handler
/// chain has returned.
///
/// The client receives every byte unchanged; see [`TeeWriter`].
pub struct ResponseCapture {
    sink: Arc<dyn AuditSink>,
}

impl ResponseCapture {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for ResponseCapture {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let capture = Capture::new();
            ctx.wrap_writer(|inner| Box::new(TeeWriter::with_capture(inner, capture.clone())));

            next.run(ctx).await;

            // Later stages may have stacked their own writers over the tee;
            // the handle reaches the buffer regardless.
            let body = capture.take().unwrap_or_default();
            let record = ResponseRecord {
                request_id: ctx.request_id().unwrap_or_default().to_owned(),
                caller_id: ctx.caller_id().unwrap_or_default(),
                model: ctx.model_name().to_owned(),
                status: ctx.writer().status(),
                body,
                captured_at: Utc::now(),
            };
            self.sink.record_response(record);
        })
    }
}
