//! Per-request context.
//!
//! One [`Context`] exists per request. It is created when the request
//! arrives, threaded by `&mut` through every middleware stage and the
//! router, and dropped when the pipeline returns. It is never shared with
//! another request.
//!
//! Stages communicate through its typed fields instead of a string-keyed
//! map: an authentication stage sets [`caller_id`](Context::set_caller_id),
//! a model-routing stage sets the model names, and the audit stages read
//! them back after the handler has run.

use std::collections::HashMap;
use std::io::{self, Write};

use http::{HeaderMap, StatusCode};

use crate::request::Request;
use crate::writer::{BoxWriter, ResponseWriter};

pub struct Context {
    request: Request,
    writer: BoxWriter,
    request_id: Option<String>,
    caller_id: Option<i64>,
    original_model: Option<String>,
    request_model: Option<String>,
    aborted: bool,
}

impl Context {
    pub fn new(request: Request, writer: impl ResponseWriter + 'static) -> Self {
        Self {
            request,
            writer: Box::new(writer),
            request_id: None,
            caller_id: None,
            original_model: None,
            request_model: None,
            aborted: false,
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }

    /// The active response writer.
    pub fn writer(&self) -> &dyn ResponseWriter { &*self.writer }
    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter { &mut *self.writer }

    /// Replaces the active writer with a decorated one.
    ///
    /// `wrap` receives the current writer by value and returns its
    /// replacement; every later write from any stage goes through it.
    pub fn wrap_writer<F>(&mut self, wrap: F)
    where
        F: FnOnce(BoxWriter) -> BoxWriter,
    {
        let current = std::mem::replace(&mut self.writer, Box::new(Detached::default()));
        self.writer = wrap(current);
    }

    /// Correlation id, set by [`RequestId`](crate::middleware::RequestId) or an upstream stage.
    pub fn request_id(&self) -> Option<&str> { self.request_id.as_deref() }
    pub fn set_request_id(&mut self, id: impl Into<String>) { self.request_id = Some(id.into()); }

    /// Numeric identifier of the authenticated caller.
    pub fn caller_id(&self) -> Option<i64> { self.caller_id }
    pub fn set_caller_id(&mut self, id: i64) { self.caller_id = Some(id); }

    /// Model name as resolved before any aliasing or rewrite.
    pub fn original_model(&self) -> Option<&str> { self.original_model.as_deref() }
    pub fn set_original_model(&mut self, model: impl Into<String>) { self.original_model = Some(model.into()); }

    /// Model name as it appeared in the request.
    pub fn request_model(&self) -> Option<&str> { self.request_model.as_deref() }
    pub fn set_request_model(&mut self, model: impl Into<String>) { self.request_model = Some(model.into()); }

    /// Model name for audit records: the original model when it is set and
    /// non-empty, otherwise the requested model, otherwise empty.
    pub fn model_name(&self) -> &str {
        match self.original_model.as_deref() {
            Some(model) if !model.is_empty() => model,
            _ => self.request_model.as_deref().unwrap_or_default(),
        }
    }

    /// Stops the request with `status`.
    ///
    /// Commits the status immediately. The caller must return without
    /// running `next`.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.writer.set_status(status);
        // A flush failure means the client is gone; nothing left to tell it.
        let _ = self.writer.flush();
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool { self.aborted }

    /// Hands the route handler its own request with the body stream.
    pub(crate) fn handler_request(&mut self, params: HashMap<String, String>) -> Request {
        self.request.split_for_handler(params)
    }
}

/// Placeholder occupying the writer slot while [`Context::wrap_writer`] runs.
#[derive(Default)]
struct Detached {
    headers: HeaderMap,
}

impl io::Write for Detached {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "response writer is being replaced"))
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl ResponseWriter for Detached {
    fn status(&self) -> StatusCode { StatusCode::OK }
    fn set_status(&mut self, _status: StatusCode) {}
    fn headers(&self) -> &HeaderMap { &self.headers }
    fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    fn is_committed(&self) -> bool { false }
    fn written(&self) -> usize { 0 }
}
