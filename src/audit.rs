//! Audit records and the sink they are handed to.
//!
//! Persisting records is the sink's business. The capture stages build one
//! [`RequestRecord`] and one [`ResponseRecord`] per request and pass them
//! on synchronously; whatever the sink does with them (write a database row,
//! enqueue, log) and however it fails is invisible to the request.

use std::borrow::Cow;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::request::Request;

/// Receives audit records from the capture stages.
pub trait AuditSink: Send + Sync + 'static {
    fn record_request(&self, record: RequestRecord);
    fn record_response(&self, record: ResponseRecord);
}

/// Snapshot of an incoming request, taken before any handler runs.
#[derive(Clone, Debug, Serialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    #[serde(serialize_with = "body_as_text")]
    pub body: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn new(request_id: &str, request: &Request, body: Bytes) -> Self {
        Self {
            request_id: request_id.to_owned(),
            method: request.method().as_str().to_owned(),
            path: request.path_and_query().to_owned(),
            client_ip: request.client_ip(),
            body,
            captured_at: Utc::now(),
        }
    }

    /// The body as text; invalid UTF-8 is replaced, not rejected.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Snapshot of a finished response, taken after the handler chain returned.
#[derive(Clone, Debug, Serialize)]
pub struct ResponseRecord {
    pub request_id: String,
    /// Caller identifier; `0` when no upstream stage set one.
    pub caller_id: i64,
    pub model: String,
    #[serde(serialize_with = "status_as_u16")]
    pub status: StatusCode,
    #[serde(serialize_with = "body_as_text")]
    pub body: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

fn body_as_text<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

fn status_as_u16<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

/// Writes each record as JSON in an `INFO` event on target `tollgate::audit`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_request(&self, record: RequestRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "tollgate::audit", kind = "request", request_id = %record.request_id, "{json}"),
            Err(e) => warn!(target: "tollgate::audit", request_id = %record.request_id, "failed to encode request record: {e}"),
        }
    }

    fn record_response(&self, record: ResponseRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "tollgate::audit", kind = "response", request_id = %record.request_id, "{json}"),
            Err(e) => warn!(target: "tollgate::audit", request_id = %record.request_id, "failed to encode response record: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_record_serializes_body_as_text() {
        let record = ResponseRecord {
            request_id: "req-1".to_owned(),
            caller_id: 42,
            model: "gpt-4".to_owned(),
            status: StatusCode::OK,
            body: Bytes::from_static(br#"{"choices":[]}"#),
            captured_at: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["caller_id"], 42);
        assert_eq!(json["body"], r#"{"choices":[]}"#);
    }

    #[test]
    fn request_record_reads_request_metadata() {
        let (parts, ()) = http::Request::post("/v1/completions?x=1")
            .header("x-forwarded-for", "203.0.113.5")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_parts(parts, None, "10.0.0.2:4000".parse().unwrap());

        let record = RequestRecord::new("req-2", &request, Bytes::from_static(b"\xffhi"));
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/v1/completions?x=1");
        assert_eq!(record.client_ip, "203.0.113.5");
        assert_eq!(record.body_text(), "\u{fffd}hi");
    }
}
