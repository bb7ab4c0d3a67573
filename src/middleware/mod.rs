//! Middleware layer.
//!
//! A middleware stage receives the request's [`Context`] and a [`Next`]
//! continuation. It may inspect or mutate the context, call
//! `next.run(ctx).await` to run everything after it, then inspect the
//! context again once the handler chain has returned. A stage that never
//! calls `next` ends the request there.
//!
//! Built-in stages:
//! - [`AccessLog`]: one formatted line per completed request
//! - [`RequestId`]: assigns the correlation id
//! - [`RequestCapture`]: buffers the request body for an audit record
//! - [`ResponseCapture`]: tees the response body into an audit record
//!
//! Stage order is fixed by [`PipelineBuilder`](crate::PipelineBuilder);
//! see there for why.

mod access_log;
mod capture;
mod request_id;

use std::sync::Arc;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::router::Router;

pub use access_log::{AccessEntry, AccessLog, LogSink, TracingSink};
pub use capture::{RequestCapture, ResponseCapture};
pub use request_id::RequestId;

/// A pipeline stage.
///
/// ```rust
/// use tollgate::{BoxFuture, Context};
/// use tollgate::middleware::{Middleware, Next};
///
/// /// Takes the model name from a header for the audit stages.
/// struct ModelFromHeader;
///
/// impl Middleware for ModelFromHeader {
///     fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
///         Box::pin(async move {
///             if let Some(model) = ctx.request().header("x-model").map(str::to_owned) {
///                 ctx.set_request_model(model);
///             }
///             next.run(ctx).await;
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()>;
}

/// The rest of the pipeline after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    router: &'a Router,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn Middleware>], router: &'a Router) -> Self {
        Self { stages, router }
    }

    /// Runs the remaining stages and finally the router.
    pub fn run<'c>(self, ctx: &'c mut Context) -> BoxFuture<'c, ()>
    where
        'a: 'c,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.call(ctx, Next { stages: rest, router: self.router }),
            None => self.router.dispatch(ctx),
        }
    }
}
