//! Error types for the SQream thin client.

use std::io;
use thiserror::Error;

/// Result type alias for SQream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Callers match on the kind to decide whether a connection can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal wire-level problem; the connection must be discarded.
    Protocol,
    /// The server rejected the statement; the connection stays usable.
    Server,
    /// A caller-supplied value does not fit the declared column type.
    Encoding,
    /// Socket-level failure (closed, reset, timeout, DNS).
    Connection,
    /// The API was used in a way the current state does not allow.
    Interface,
}

/// Error type for SQream thin client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection timed out during TCP connect.
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout: std::time::Duration,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}': {message}")]
    DnsResolutionFailed { hostname: String, message: String },

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Server answered with a protocol version this client does not speak.
    #[error("Unsupported protocol version {version} (supported: {supported:?})")]
    UnsupportedProtocolVersion { version: u8, supported: &'static [u8] },

    /// Unexpected frame kind received.
    #[error("Unexpected frame kind: expected {expected}, got {actual}")]
    UnexpectedFrameKind { expected: u8, actual: u8 },

    /// Buffer too small to read the requested bytes.
    #[error("Buffer too small: needed {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    /// Declared fetch region sizes do not add up to the bytes received.
    #[error("Region size mismatch: declared {declared} bytes, received {received}")]
    RegionSizeMismatch { declared: usize, received: usize },

    /// Malformed JSON or JSON of the wrong shape.
    #[error("Malformed server message: {0}")]
    Json(#[from] serde_json::Error),

    /// Fetched data could not be decoded.
    #[error("Cannot decode column {column}, row {row}: {message}")]
    Decode {
        column: usize,
        row: usize,
        message: String,
    },

    /// Error reported by the SQream server.
    #[error("Server error: {message}")]
    Server { message: String },

    /// Value does not fit the declared column type, width or range.
    #[error("Cannot encode column {column}, row {row} as {declared}: {message}")]
    Encoding {
        column: usize,
        row: usize,
        declared: String,
        message: String,
    },

    /// Unsupported SQream column type.
    #[error("Unsupported SQream data type: {type_name}")]
    UnsupportedType { type_name: String },

    /// Operation not valid in the current statement or connection state.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Invalid connect string.
    #[error("Invalid connect string: {message}")]
    InvalidConnectString { message: String },
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create an encoding error for one value.
    pub fn encoding(
        column: usize,
        row: usize,
        declared: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            column,
            row,
            declared: declared.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::ConnectionClosed
            | Error::ConnectionTimeout { .. }
            | Error::DnsResolutionFailed { .. } => ErrorKind::Connection,
            Error::Protocol { .. }
            | Error::UnsupportedProtocolVersion { .. }
            | Error::UnexpectedFrameKind { .. }
            | Error::BufferTooSmall { .. }
            | Error::RegionSizeMismatch { .. }
            | Error::Json(_)
            | Error::Decode { .. }
            | Error::UnsupportedType { .. } => ErrorKind::Protocol,
            Error::Server { .. } => ErrorKind::Server,
            Error::Encoding { .. } => ErrorKind::Encoding,
            Error::InvalidState { .. } | Error::InvalidConnectString { .. } => {
                ErrorKind::Interface
            }
        }
    }

    /// First line of a server error message, which carries the actual reason.
    pub fn server_headline(&self) -> Option<&str> {
        match self {
            Error::Server { message } => message.lines().next(),
            _ => None,
        }
    }

    /// Whether the connection that produced this error must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Protocol | ErrorKind::Connection)
    }
}
