//! Socket establishment, directly or through an HTTP `CONNECT` proxy tunnel.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, client_async_tls, connect_async};
use url::Url;

use crate::error::{InvestingError, Result};
use crate::types::proxy::ProxyConfig;

/// A client WebSocket over plain TCP or TLS.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Largest proxy response header accepted while opening a tunnel.
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// Open a WebSocket to `url`, tunnelling through `proxy` when given.
pub async fn open(url: &str, proxy: Option<&ProxyConfig>) -> Result<WsStream> {
    let ws = match proxy {
        None => connect_async(url).await?.0,
        Some(proxy) => {
            let stream = tunnel(url, proxy).await?;
            client_async_tls(url, stream).await?.0
        }
    };
    Ok(ws)
}

/// Ask an HTTP proxy for a raw TCP tunnel to the host of `url`.
async fn tunnel(url: &str, proxy: &ProxyConfig) -> Result<TcpStream> {
    if !proxy.supports_connect() {
        return Err(InvestingError::InvalidArgument(format!(
            "`{}` proxies cannot carry the stream connection",
            proxy.scheme
        )));
    }

    let target = Url::parse(url)?;
    let host = target
        .host_str()
        .ok_or_else(|| InvestingError::InvalidArgument(format!("no host in `{url}`")))?;
    let port = target
        .port_or_known_default()
        .ok_or_else(|| InvestingError::InvalidArgument(format!("no port for `{url}`")))?;
    let authority = format!("{host}:{port}");

    let mut stream = TcpStream::connect(proxy.authority()).await?;

    let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if let Some(auth) = proxy.basic_auth() {
        request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    let head = read_response_head(&mut stream).await?;
    let status_line = head.lines().next().unwrap_or_default();
    let accepted = status_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|code| code == "200");
    if !accepted {
        return Err(InvestingError::Proxy(format!(
            "tunnel to {authority} refused: {status_line}"
        )));
    }

    tracing::debug!(proxy = %proxy.authority(), %authority, "Proxy tunnel established");
    Ok(stream)
}

/// Read up to and including the blank line ending the proxy's response
/// headers, leaving the tunnelled bytes unread.
async fn read_response_head(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];

    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_TUNNEL_RESPONSE {
            return Err(InvestingError::Proxy("oversized proxy response".into()));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(InvestingError::Proxy(
                "proxy closed the connection during CONNECT".into(),
            ));
        }
        head.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}
