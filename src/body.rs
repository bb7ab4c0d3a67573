//! Request body stream.
//!
//! A [`Body`] is whatever the connection hands us: a hyper `Incoming`
//! stream in production, an in-memory buffer after capture, or any other
//! `http_body::Body` in tests. It can be read to completion exactly once.

use std::fmt;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};

use crate::error::{BoxError, Error};

/// A type-erased, single-use request body.
pub struct Body(UnsyncBoxBody<Bytes, BoxError>);

impl Body {
    /// Wraps any `http_body::Body` yielding [`Bytes`].
    pub fn new<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(Into::into).boxed_unsync())
    }

    /// A body with no bytes in it.
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Reads the stream to completion.
    ///
    /// Suspends the calling task until the last frame arrives. Trailers are
    /// discarded. A failed read yields [`Error::Body`]; the bytes read so
    /// far are lost along with the stream.
    pub async fn into_bytes(self) -> Result<Bytes, Error> {
        let collected = self.0.collect().await.map_err(Error::Body)?;
        Ok(collected.to_bytes())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::new(Full::new(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}
