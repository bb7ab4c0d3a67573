//! Unified error type.

/// Boxed error used for body streams of unknown origin.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by tollgate's fallible operations.
///
/// Application-level failures (404, 500, etc.) are expressed as HTTP
/// responses written through the active writer, not as `Error`s. This type
/// surfaces infrastructure failures: binding a port, accepting a connection,
/// or reading a request body off the wire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("body: {0}")]
    Body(#[source] BoxError),
}
