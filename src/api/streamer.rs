//! Stream server discovery.

use serde::Deserialize;

use crate::client::InvestingClient;
use crate::constants::STREAMER_PATH;
use crate::error::{InvestingError, Result};

/// Response of the streamer endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamerResponse {
    /// Host names of the available stream servers.
    #[serde(default)]
    pub stream_servers: Vec<String>,
}

impl InvestingClient {
    /// Resolve the address of a stream server.
    ///
    /// Returns the first entry advertised by the streamer endpoint. Every
    /// failure, transport or payload, is reported as
    /// [`InvestingError::Discovery`].
    ///
    /// **Endpoint:** `GET /api/editions/streamer`
    pub async fn get_stream_server(&self) -> Result<String> {
        let resp: StreamerResponse = self
            .get_json(STREAMER_PATH)
            .await
            .map_err(|e| InvestingError::Discovery(e.to_string()))?;

        let server = resp
            .stream_servers
            .into_iter()
            .map(|s| s.trim().to_owned())
            .find(|s| !s.is_empty())
            .ok_or_else(|| InvestingError::Discovery("no stream servers advertised".into()))?;

        tracing::debug!(%server, "Resolved stream server");
        Ok(server)
    }
}
