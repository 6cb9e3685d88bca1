//! Error types for the WebSocket protocol implementation.
//!
//! Every failure is local to the URL, message, or connection it occurred on;
//! no error here ever terminates the process.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL port is not numeric.
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// HTTP start line is not `METHOD SP TARGET SP PROTO` (or `PROTO SP STATUS`).
    #[error("Malformed start line: {0}")]
    MalformedStartLine(String),

    /// HTTP protocol is neither HTTP/1.1 nor HTTP/1.0.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Header line does not contain `": "` exactly once.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// No blank line separating headers from body.
    #[error("Missing blank line between headers and body")]
    MissingBodySeparator,

    /// The opening handshake was rejected by either peer.
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// TCP connect did not complete within the configured timeout.
    #[error("Connect timed out")]
    ConnectTimeout,

    /// The peer refused the TCP connection.
    #[error("Connection refused")]
    ConnectRefused,

    /// Fewer bytes available than the frame header declares.
    #[error("Truncated frame: need {needed} more bytes")]
    TruncatedFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Opcode outside the six values defined by RFC 6455.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frame with FIN=0 (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload over 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Invalid UTF-8 in a text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Single frame declares a payload larger than the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Malformed or truncated frame observed by the receive loop.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Operation attempted on a closed connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Error::ConnectRefused,
            std::io::ErrorKind::TimedOut => Error::ConnectTimeout,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
