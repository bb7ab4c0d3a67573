//! Audited echo service.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example audit
//!
//! Try:
//!   curl -X POST http://localhost:3000/v1/chat/completions \
//!        -H 'x-model: gpt-4' -H 'x-caller-id: 17' \
//!        -d '{"messages":[{"role":"user","content":"hi"}]}'
//!   curl http://localhost:3000/v1/models/gpt-4
//!
//! Each request prints one access line plus a request and a response audit
//! record.

use std::sync::Arc;

use tollgate::audit::TracingAuditSink;
use tollgate::middleware::{AccessLog, Middleware, Next, RequestId};
use tollgate::{BoxFuture, Context, Pipeline, Request, Response, Router, Server, StatusCode};

#[tokio::main]
async fn main() -> Result<(), tollgate::Error> {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .post("/v1/chat/completions", chat)
        .get("/v1/models/{model}", model);

    let app = Pipeline::builder()
        .access_log(AccessLog::default())
        .request_id(RequestId::new())
        .audit(Arc::new(TracingAuditSink))
        .layer(CallerHeaders)
        .build(router);

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

/// Stands in for an auth and model-routing stage: takes the caller and
/// model from headers.
struct CallerHeaders;

impl Middleware for CallerHeaders {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let caller = ctx.request().header("x-caller-id").and_then(|id| id.parse().ok());
            let model = ctx.request().header("x-model").map(str::to_owned);
            if let Some(caller) = caller {
                ctx.set_caller_id(caller);
            }
            if let Some(model) = model {
                ctx.set_request_model(model);
            }
            next.run(ctx).await;
        })
    }
}

// POST /v1/chat/completions, echoes the request as the "completion".
async fn chat(mut req: Request) -> Response {
    match req.bytes().await {
        Ok(body) if !body.is_empty() => Response::json(body.to_vec()),
        Ok(_) => Response::status(StatusCode::BAD_REQUEST),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /v1/models/{model}
async fn model(req: Request) -> Response {
    let id = req.param("model").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","object":"model"}}"#).into_bytes())
}
