//! Request pipeline: the ordered middleware stages in front of the router.
//!
//! # Stage order
//!
//! Which stage sees which body and which writer depends entirely on order,
//! so the builder fixes it instead of leaving it to registration order:
//!
//! | # | Stage | Why here |
//! |---|---|---|
//! | 1 | [`AccessLog`] | outermost: sees the final status and full latency, including aborts |
//! | 2 | [`RequestId`] | every later stage and both audit records carry the id |
//! | 3 | [`RequestCapture`] | must read the body before anything else consumes it |
//! | 4 | [`ResponseCapture`] | must install its tee before anything writes |
//! | 5 | custom layers | in the order they were added |
//! | 6 | [`Router`] | runs the handler and writes its response |
//!
//! A request-capture abort therefore skips response capture and every
//! custom layer, and the access log still records the `500`.

use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use tracing::error;

use crate::audit::AuditSink;
use crate::context::Context;
use crate::middleware::{AccessLog, Middleware, Next, RequestCapture, RequestId, ResponseCapture};
use crate::request::Request;
use crate::router::Router;
use crate::writer::{HttpWriter, ResponseBody};

/// Middleware stages plus the router, ready to serve.
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    router: Router,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Runs every stage and the router for one request.
    ///
    /// The context, and with it the response writer, is dropped on return,
    /// which ends the response stream.
    pub async fn handle(&self, mut ctx: Context) {
        Next::new(&self.stages, &self.router).run(&mut ctx).await;
    }

    /// Serves one request on its own task and returns the response as soon
    /// as its head is committed. The body keeps streaming while the
    /// pipeline runs.
    pub async fn respond(self: Arc<Self>, request: Request) -> http::Response<ResponseBody> {
        let (writer, head, body) = HttpWriter::channel();
        let ctx = Context::new(request, writer);
        tokio::spawn(async move { self.handle(ctx).await });

        let (status, headers) = match head.await {
            Ok(head) => head,
            Err(_) => {
                error!("request task ended without committing a response");
                (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new())
            }
        };
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl From<Router> for Pipeline {
    fn from(router: Router) -> Self {
        Pipeline::builder().build(router)
    }
}

/// Collects stages for a [`Pipeline`]. See the [module docs](self) for the
/// order they run in.
#[derive(Default)]
pub struct PipelineBuilder {
    access_log: Option<AccessLog>,
    request_id: Option<RequestId>,
    request_capture: Option<RequestCapture>,
    response_capture: Option<ResponseCapture>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn access_log(mut self, access_log: AccessLog) -> Self {
        self.access_log = Some(access_log);
        self
    }

    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn capture_requests(mut self, capture: RequestCapture) -> Self {
        self.request_capture = Some(capture);
        self
    }

    pub fn capture_responses(mut self, capture: ResponseCapture) -> Self {
        self.response_capture = Some(capture);
        self
    }

    /// Captures both requests and responses into the same sink.
    pub fn audit(self, sink: Arc<dyn AuditSink>) -> Self {
        self.capture_requests(RequestCapture::new(Arc::clone(&sink)))
            .capture_responses(ResponseCapture::new(sink))
    }

    /// Adds a custom stage. Custom stages run after the built-in ones, in
    /// the order they were added.
    pub fn layer(mut self, layer: impl Middleware) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn build(self, router: Router) -> Pipeline {
        let mut stages: Vec<Arc<dyn Middleware>> = Vec::with_capacity(4 + self.layers.len());
        if let Some(stage) = self.access_log {
            stages.push(Arc::new(stage));
        }
        if let Some(stage) = self.request_id {
            stages.push(Arc::new(stage));
        }
        if let Some(stage) = self.request_capture {
            stages.push(Arc::new(stage));
        }
        if let Some(stage) = self.response_capture {
            stages.push(Arc::new(stage));
        }
        stages.extend(self.layers);
        Pipeline { stages, router }
    }
}
