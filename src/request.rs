//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

use crate::body::Body;
use crate::error::{BoxError, Error};

/// An incoming HTTP request.
///
/// The body is optional: requests arriving off the wire always carry one
/// (possibly empty), while requests assembled in code may have none.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Option<Body>,
    params: HashMap<String, String>,
    remote_addr: SocketAddr,
}

impl Request {
    /// Builds a request from its head, an optional body and the peer address.
    pub fn from_parts(parts: http::request::Parts, body: Option<Body>, remote_addr: SocketAddr) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr,
        }
    }

    /// Converts an `http::Request` carrying any byte body.
    pub fn from_http<B>(req: http::Request<B>, remote_addr: SocketAddr) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, Some(Body::new(body)), remote_addr)
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn version(&self) -> Version { self.version }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Path with the raw query string appended, as it appears in access logs.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Address of the originating client.
    ///
    /// Behind a reverse proxy the peer is the proxy itself, so the first
    /// `X-Forwarded-For` hop wins, then `X-Real-IP`, then the socket peer.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_owned();
        }
        match self.header("x-real-ip").map(str::trim) {
            Some(ip) if !ip.is_empty() => ip.to_owned(),
            _ => self.remote_addr.ip().to_string(),
        }
    }

    pub fn body(&self) -> Option<&Body> { self.body.as_ref() }

    /// Removes the body stream, leaving the request without one.
    pub fn take_body(&mut self) -> Option<Body> { self.body.take() }

    pub fn set_body(&mut self, body: impl Into<Body>) { self.body = Some(body.into()); }

    /// Reads the whole body. A request without a body reads as empty.
    ///
    /// The stream is consumed; call [`set_body`](Self::set_body) to put the
    /// bytes back if something further down needs them.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        match self.body.take() {
            Some(body) => body.into_bytes().await,
            None => Ok(Bytes::new()),
        }
    }

    /// Detaches a copy of the head plus the body stream for a route handler.
    ///
    /// The original keeps its head so outer stages can still log the method,
    /// path and client address once the handler has returned.
    pub(crate) fn split_for_handler(&mut self, params: HashMap<String, String>) -> Request {
        Request {
            method: self.method.clone(),
            uri: self.uri.clone(),
            version: self.version,
            headers: self.headers.clone(),
            body: self.body.take(),
            params,
            remote_addr: self.remote_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(builder: http::request::Builder) -> Request {
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Request::from_parts(parts, None, "10.0.0.7:51000".parse().unwrap())
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let req = request(http::Request::get("/"));
        assert_eq!(req.client_ip(), "10.0.0.7");
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let req = request(
            http::Request::get("/")
                .header("x-forwarded-for", " 203.0.113.9 , 10.0.0.1")
                .header("x-real-ip", "198.51.100.4"),
        );
        assert_eq!(req.client_ip(), "203.0.113.9");
    }

    #[test]
    fn client_ip_uses_real_ip_without_forwarded_for() {
        let req = request(http::Request::get("/").header("x-real-ip", "198.51.100.4"));
        assert_eq!(req.client_ip(), "198.51.100.4");
    }

    #[test]
    fn path_and_query_keeps_raw_query() {
        let req = request(http::Request::get("/v1/models?limit=5&after=a"));
        assert_eq!(req.path(), "/v1/models");
        assert_eq!(req.path_and_query(), "/v1/models?limit=5&after=a");
    }

    #[tokio::test]
    async fn missing_body_reads_empty() {
        let mut req = request(http::Request::post("/"));
        assert!(req.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_split_moves_body_and_keeps_head() {
        let mut req = request(http::Request::post("/users/7"));
        req.set_body("payload");

        let params = HashMap::from([("id".to_owned(), "7".to_owned())]);
        let mut handler_req = req.split_for_handler(params);

        assert!(req.body().is_none());
        assert_eq!(req.path(), "/users/7");
        assert_eq!(handler_req.param("id"), Some("7"));
        assert_eq!(handler_req.bytes().await.unwrap(), Bytes::from_static(b"payload"));
    }
}
