use std::io;

use crate::store::StoreError;

/// Fatal errors for a connection or the server itself.
///
/// Anything a handler can answer on the wire (bad parameters, missing
/// objects, authorization failures) is expressed as an EPP result code
/// instead; this type is reserved for conditions that end the session or
/// abort startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] instant_xml::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("frame payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("operation timed out")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("frame length {0} outside accepted bounds")]
    FrameLength(usize),
    #[error("{0}")]
    Other(String),
}
