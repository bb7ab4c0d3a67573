//! Access log: one line per completed request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use http::{Method, StatusCode};
use tracing::info;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};

/// Destination for formatted access-log lines.
///
/// Any `Fn(&str) + Send + Sync` closure is a sink.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

/// Emits each line as an `INFO` event on target `tollgate::access`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: &str) {
        info!(target: "tollgate::access", "{line}");
    }
}

/// Everything known about a request once it has completed.
#[derive(Debug)]
pub struct AccessEntry<'a> {
    pub timestamp: DateTime<Local>,
    /// Empty when no correlation id was assigned.
    pub request_id: &'a str,
    pub status: StatusCode,
    pub latency: Duration,
    pub client_ip: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
}

impl AccessEntry<'_> {
    /// `[TAG] 2024/05/01 - 13:04:05 | id | 200 |      1.2345ms |       127.0.0.1 |     GET /path`
    pub fn format(&self, tag: &str) -> String {
        format!(
            "[{tag}] {} | {} | {:>3} | {:>13} | {:>15} | {:>7} {}",
            self.timestamp.format("%Y/%m/%d - %H:%M:%S"),
            self.request_id,
            self.status.as_u16(),
            format!("{:?}", self.latency),
            self.client_ip,
            self.method.as_str(),
            self.path,
        )
    }
}

/// Access-log stage.
///
/// Runs outermost so the line carries the final status and the full
/// latency, including any short-circuit by an inner stage.
pub struct AccessLog {
    sink: Arc<dyn LogSink>,
    tag: String,
}

impl AccessLog {
    pub fn new(sink: impl LogSink) -> Self {
        Self { sink: Arc::new(sink), tag: "TOLLGATE".to_owned() }
    }

    /// Replaces the bracketed tag that starts every line.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Default for AccessLog {
    fn default() -> Self { Self::new(TracingSink) }
}

impl Middleware for AccessLog {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path_and_query().to_owned();
            let client_ip = ctx.request().client_ip();

            next.run(ctx).await;

            let entry = AccessEntry {
                timestamp: Local::now(),
                request_id: ctx.request_id().unwrap_or_default(),
                status: ctx.writer().status(),
                latency: start.elapsed(),
                client_ip: &client_ip,
                method: &method,
                path: &path,
            };
            self.sink.emit(&entry.format(&self.tag));
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry<'a>(request_id: &'a str, method: &'a Method) -> AccessEntry<'a> {
        AccessEntry {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap(),
            request_id,
            status: StatusCode::OK,
            latency: Duration::from_micros(1500),
            client_ip: "127.0.0.1",
            method,
            path: "/v1/chat/completions?stream=true",
        }
    }

    #[test]
    fn formats_fixed_layout() {
        let line = entry("20240501130405abcdefgh", &Method::POST).format("GIN");
        assert_eq!(
            line,
            "[GIN] 2024/05/01 - 13:04:05 | 20240501130405abcdefgh | 200 |         1.5ms |       127.0.0.1 |    POST /v1/chat/completions?stream=true"
        );
    }

    #[test]
    fn missing_request_id_leaves_empty_field() {
        let line = entry("", &Method::GET).format("TOLLGATE");
        assert!(line.starts_with("[TOLLGATE] 2024/05/01 - 13:04:05 |  | 200 |"));
    }

    #[test]
    fn closure_is_a_sink() {
        let lines = Arc::new(std::sync::Mutex::new(Vec::new()));
        let collected = Arc::clone(&lines);
        let sink = move |line: &str| collected.lock().unwrap().push(line.to_owned());
        sink.emit("one");
        assert_eq!(*lines.lock().unwrap(), vec!["one".to_owned()]);
    }
}
