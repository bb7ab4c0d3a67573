//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. The router is the last
//! step of every pipeline: it runs the matched handler and writes the
//! handler's response through the context's active writer.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and hand it to a
/// [`PipelineBuilder`](crate::PipelineBuilder) or directly to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Final pipeline step: route, run the handler, write its response.
    pub(crate) fn dispatch<'c>(&'c self, ctx: &'c mut Context) -> BoxFuture<'c, ()> {
        Box::pin(async move {
            let matched = self.lookup(ctx.request().method(), ctx.request().path());
            let response = match matched {
                Some((handler, params)) => handler.call(ctx.handler_request(params)).await,
                None => Response::status(StatusCode::NOT_FOUND),
            };
            if let Err(e) = response.write_to(ctx.writer_mut()) {
                debug!(error = %e, "response write failed, client likely gone");
            }
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
