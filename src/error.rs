//! Error types for the `investing-rs` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, InvestingError>`.
//!
//! [`InvestingError`] covers:
//! - **Connection errors**: WebSocket open/send/close failures and timeouts
//! - **Decode errors**: Malformed or unparseable stream frames
//! - **Not connected**: Subscribe/unsubscribe attempted without an open socket
//! - **Discovery errors**: The stream server could not be resolved
//! - **HTTP errors**: Transport failures and unexpected status codes
//! - **Proxy / URL errors**: Malformed proxy or endpoint URLs

/// All possible errors produced by the `investing-rs` client.
#[derive(Debug, thiserror::Error)]
pub enum InvestingError {
    /// A WebSocket-level error (socket open, send, or close failed).
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// An inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An operation that needs an open connection was attempted without one.
    #[error("connection is not open")]
    NotConnected,

    /// The stream server address could not be resolved.
    #[error("stream server discovery failed: {0}")]
    Discovery(String),

    /// The server returned an unexpected HTTP status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: reqwest::StatusCode,
        /// The response body text.
        body: String,
    },

    /// A network or transport-level error from `reqwest`.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error on a raw socket (proxy tunnelling).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error building or parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The proxy rejected the tunnel or its URL is unusable.
    #[error("proxy error: {0}")]
    Proxy(String),

    /// The caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl InvestingError {
    /// Whether this error belongs to the connection class (socket open, send,
    /// close, or proxy tunnel failures).
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::Connection(_) | Self::Io(_) | Self::Proxy(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InvestingError>;
