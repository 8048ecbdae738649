//! Constants for the Investing.com endpoints and streaming protocol.
//!
//! These are used internally by [`InvestingClient`](crate::client::InvestingClient)
//! and the streaming types, but are also exported for advanced usage.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Base URLs
// ---------------------------------------------------------------------------

/// Base URL for the public website (instrument pages, relative links).
pub const WEB_BASE_URL: &str = "https://www.investing.com";

/// Base URL for the JSON API host.
pub const API_BASE_URL: &str = "https://api.investing.com";

/// Path of the endpoint listing the available stream servers.
pub const STREAMER_PATH: &str = "/api/editions/streamer";

/// Browser user agent sent with every HTTP request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Streaming protocol
// ---------------------------------------------------------------------------

/// Streaming protocol parameters.
pub mod stream {
    use super::Duration;

    /// Scheme of the stream endpoint.
    pub const SCHEME: &str = "wss";

    /// Session tags are drawn from `0..SESSION_TAG_LIMIT`.
    pub const SESSION_TAG_LIMIT: u32 = 1000;

    /// Length of the random session token.
    pub const SESSION_TOKEN_LEN: usize = 8;

    /// Alphabet of the random session token.
    pub const SESSION_TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    /// Time zone id sent with subscribe/unsubscribe requests.
    pub const TZ_ID: u8 = 8;

    /// Interval between keep-alive frames.
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

    /// Upper bound on waiting for the background tasks during disconnect.
    pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

    /// Upper bound on the WebSocket handshake.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Marker every frame of interest starts with.
    pub const ENVELOPE_MARKER: char = 'a';

    /// Delimiter between the channel name and the payload.
    pub const PAYLOAD_DELIMITER: &str = "::";

    /// Number of characters closing the envelope after the payload.
    pub const ENVELOPE_TRAILER_LEN: usize = 4;
}
