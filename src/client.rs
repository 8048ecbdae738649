//! Core HTTP client for the Investing.com web and API hosts.
//!
//! The [`InvestingClient`] struct wraps [`reqwest::Client`] with the browser
//! headers the site expects and an optional proxy. Endpoint methods (stream
//! server discovery, quote snapshots) are added via `impl` blocks in the
//! [`crate::api`] module.

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::constants::{API_BASE_URL, USER_AGENT, WEB_BASE_URL};
use crate::error::{InvestingError, Result};
use crate::types::proxy::ProxyConfig;

/// HTTP client for the Investing.com web pages and JSON API.
///
/// # Example
///
/// ```no_run
/// use investing_rs::client::InvestingClient;
///
/// # #[tokio::main]
/// # async fn main() -> investing_rs::error::Result<()> {
/// let client = InvestingClient::new()?;
/// let server = client.get_stream_server().await?;
/// println!("stream server: {server}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InvestingClient {
    http: reqwest::Client,
    /// Base URL of the JSON API host (defaults to [`API_BASE_URL`]).
    api_base_url: String,
    /// Base URL relative page links are resolved against (defaults to
    /// [`WEB_BASE_URL`]).
    web_base_url: String,
}

impl InvestingClient {
    /// Create a client for the public hosts without a proxy.
    pub fn new() -> Result<Self> {
        Self::with_base_urls(API_BASE_URL, WEB_BASE_URL, None)
    }

    /// Create a client pointing at custom hosts, optionally through a proxy.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_urls(
        api_base_url: impl Into<String>,
        web_base_url: impl Into<String>,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .default_headers(Self::default_headers())
            .user_agent(USER_AGENT);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(&proxy.url)?);
        }

        Ok(Self {
            http: builder.build()?,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            web_base_url: web_base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Returns a reference to the underlying `reqwest::Client`.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the API base URL.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Returns the web base URL.
    pub fn web_base_url(&self) -> &str {
        &self.web_base_url
    }

    // -----------------------------------------------------------------------
    // Generic HTTP helpers
    // -----------------------------------------------------------------------

    /// GET an API path and deserialize the JSON response.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = join(&self.api_base_url, path);
        let body = self.get_text(&url).await?;
        serde_json::from_str(&body).map_err(InvestingError::Json)
    }

    /// GET a page and return its body. Links starting with `/` are resolved
    /// against the web base URL.
    pub async fn get_page(&self, link: &str) -> Result<String> {
        let url = self.resolve_link(link);
        self.get_text(&url).await
    }

    /// Absolute URL for a page link.
    pub fn resolve_link(&self, link: &str) -> String {
        if link.starts_with('/') {
            join(&self.web_base_url, link)
        } else {
            link.to_owned()
        }
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "GET");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(InvestingError::HttpStatus { status, body })
        }
    }

    /// Default headers applied to every request.
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        headers
    }
}

fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
