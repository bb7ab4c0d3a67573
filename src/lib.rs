//! # tollgate
//!
//! Access logging and request/response audit capture for HTTP services
//! running behind a reverse proxy, on a small hyper-based host.
//!
//! ## What happens to a request
//!
//! ```text
//! client ─▶ AccessLog ─▶ RequestId ─▶ RequestCapture ─▶ ResponseCapture ─▶ your layers ─▶ Router ─▶ handler
//!              │                          │                   │
//!              ▼                          ▼                   ▼
//!          LogSink line           AuditSink::record_request   AuditSink::record_response
//! ```
//!
//! - **Access log**: one fixed-format line per completed request.
//! - **Request capture**: reads the body into memory, records it, and puts
//!   an identical, unread body back for the handler.
//! - **Response capture**: swaps the response writer for a tee that copies
//!   every byte into a buffer while still writing it to the client, then
//!   records the buffer once the handler chain returns.
//!
//! Stage order is fixed by [`PipelineBuilder`]; see [`pipeline`] for the
//! reasoning.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tollgate::audit::TracingAuditSink;
//! use tollgate::middleware::{AccessLog, RequestId};
//! use tollgate::{Pipeline, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let router = Router::new().post("/v1/echo", echo);
//!
//!     let app = Pipeline::builder()
//!         .access_log(AccessLog::default())
//!         .request_id(RequestId::new())
//!         .audit(Arc::new(TracingAuditSink))
//!         .build(router);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn echo(mut req: Request) -> Response {
//!     match req.bytes().await {
//!         Ok(body) => Response::json(body.to_vec()),
//!         Err(_) => Response::status(tollgate::StatusCode::BAD_REQUEST),
//!     }
//! }
//! ```

mod body;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod tee;
mod writer;

pub mod audit;
pub mod middleware;
pub mod pipeline;

pub use body::Body;
pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use tee::{Capture, TeeWriter};
pub use writer::{BoxWriter, HttpWriter, ResponseBody, ResponseWriter};
