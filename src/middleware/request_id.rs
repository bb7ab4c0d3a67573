//! Correlation id assignment.

use http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};

/// Assigns a correlation id unless an earlier stage already did, and
/// echoes it to the client in a response header (`x-request-id` by default).
pub struct RequestId {
    header: HeaderName,
}

impl RequestId {
    pub fn new() -> Self {
        Self { header: HeaderName::from_static("x-request-id") }
    }

    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl Default for RequestId {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestId {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let id = match ctx.request_id() {
                Some(id) => id.to_owned(),
                None => {
                    let id = Uuid::new_v4().simple().to_string();
                    ctx.set_request_id(id.clone());
                    id
                }
            };
            if let Ok(value) = HeaderValue::from_str(&id) {
                ctx.writer_mut().headers_mut().insert(self.header.clone(), value);
            }
            next.run(ctx).await;
        })
    }
}
