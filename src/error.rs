//! Error types for the WebSocket server.
//!
//! Protocol violations render as the human-readable reason a connection is
//! closed with, so `error.to_string()` is what close listeners observe.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a WebSocket connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The upgrade request carried no `Sec-WebSocket-Key` header.
    #[error("Aborting non-websocket connection!")]
    MissingWebSocketKey,

    /// The upgrade request exceeded the configured size.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Writing the upgrade response failed.
    #[error("Connection Failed!")]
    HandshakeFailed,

    /// Unmasked client frame (RFC 6455 Section 5.1).
    #[error("Unmasked frame from client to server!")]
    UnmaskedClientFrame,

    /// Control frame with FIN=0.
    #[error("Control frame can't be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload over 125 bytes.
    #[error("Control frame can't have payload length greater than 125")]
    ControlFrameTooLarge(u64),

    /// Opcode outside the supported set.
    #[error("Unsupported Opcode!")]
    ReservedOpcode(u8),

    /// Close frame payload that is neither empty nor at least a status code.
    #[error("Invalid close frame payload")]
    InvalidClosePayload,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// The peer went away without a close frame.
    #[error("Connection reset")]
    ConnectionReset,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Error::ConnectionReset,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8
    }
}
