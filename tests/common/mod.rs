//! Shared fixtures: a local stream server, frame builders, and a recording
//! handler.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use investing_rs::error::InvestingError;
use investing_rs::types::quote::AliasedQuote;
use investing_rs::ws::config::OnlineConfig;
use investing_rs::ws::connection::ConnectionState;
use investing_rs::ws::events::OnlineHandler;
use investing_rs::ws::frames::ControlFrame;
use investing_rs::ws::online::Online;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// An update frame escaped the way the stream server sends it.
pub fn quote_frame(instrument_id: u64, record: &Value) -> String {
    let message = format!("pid-{instrument_id}::{record}");
    let envelope = json!({ "message": message }).to_string();
    format!("a{}", json!([envelope]))
}

/// A keep-alive answer as sent by the stream server.
pub fn heartbeat_frame() -> String {
    let envelope = json!({ "message": "heartbeat" }).to_string();
    format!("a{}", json!([envelope]))
}

pub fn heartbeat_text() -> String {
    ControlFrame::heartbeat().encode().unwrap()
}

// ---------------------------------------------------------------------------
// Stream server
// ---------------------------------------------------------------------------

/// A WebSocket server on `127.0.0.1` standing in for the stream endpoint.
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>> =
            Arc::new(Mutex::new(None));

        let counter = Arc::clone(&accepted);
        let slot = Arc::clone(&outbound);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(tcp).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let (out_tx, mut out_rx) = mpsc::unbounded_channel();
                *slot.lock() = Some(out_tx);
                let inbound_tx = inbound_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = ws.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = inbound_tx.send(text.as_str().to_owned());
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                            out = out_rx.recv() => match out {
                                Some(msg) => {
                                    let closing = matches!(msg, Message::Close(_));
                                    if ws.send(msg).await.is_err() || closing {
                                        break;
                                    }
                                }
                                None => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            accepted,
            inbound,
            outbound,
        }
    }

    /// Configuration pointing an [`Online`] at this server.
    pub fn config(&self) -> OnlineConfig {
        OnlineConfig::builder()
            .stream_scheme("ws")
            .stream_server(self.addr.to_string())
            .close_timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    /// Number of WebSocket handshakes accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Send a text frame to the most recent client.
    pub fn push(&self, text: impl Into<String>) {
        let text: String = text.into();
        let slot = self.outbound.lock();
        let tx = slot.as_ref().expect("no client connected");
        tx.send(Message::Text(text.into())).unwrap();
    }

    /// Close the most recent client from the server side.
    pub fn close_client(&self) {
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(Message::Close(None));
        }
    }

    /// Drop the most recent client's TCP stream without a close handshake.
    pub fn drop_client(&self) {
        self.outbound.lock().take();
    }

    /// Next text frame from the client that is not a heartbeat.
    pub async fn next_control(&mut self) -> String {
        let heartbeat = heartbeat_text();
        loop {
            let text = tokio::time::timeout(WAIT, self.inbound.recv())
                .await
                .expect("timed out waiting for a client frame")
                .expect("server stopped");
            if text != heartbeat {
                return text;
            }
        }
    }

    /// Drain every frame received so far.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(text) = self.inbound.try_recv() {
            out.push(text);
        }
        out
    }

    /// Wait `window`, then return the non-heartbeat frames that arrived.
    pub async fn controls_within(&mut self, window: Duration) -> Vec<String> {
        tokio::time::sleep(window).await;
        let heartbeat = heartbeat_text();
        self.drain().into_iter().filter(|t| *t != heartbeat).collect()
    }
}

// ---------------------------------------------------------------------------
// Recording handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Seen {
    Open,
    Quote(AliasedQuote),
    Heartbeat,
    Error(String),
    Close,
}

pub struct Recorder(mpsc::UnboundedSender<Seen>);

pub fn recorder() -> (Recorder, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder(tx), rx)
}

impl OnlineHandler for Recorder {
    fn on_open(&self, _online: &Online) {
        let _ = self.0.send(Seen::Open);
    }

    fn on_quote(&self, _online: &Online, quote: &AliasedQuote) {
        let _ = self.0.send(Seen::Quote(quote.clone()));
    }

    fn on_heartbeat(&self, _online: &Online) {
        let _ = self.0.send(Seen::Heartbeat);
    }

    fn on_error(&self, _online: &Online, error: &InvestingError) {
        let _ = self.0.send(Seen::Error(error.to_string()));
    }

    fn on_close(&self, _online: &Online) {
        let _ = self.0.send(Seen::Close);
    }
}

/// Poll until `online` reports `Open`, without waiting on the handler.
pub async fn wait_open(online: &Online) {
    tokio::time::timeout(WAIT, async {
        while online.state().await != ConnectionState::Open {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection did not open");
}

/// Next callback, failing the test after [`WAIT`].
pub async fn next_seen(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("handler dropped")
}

/// Assert that no callback fires within `window`.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Seen>, window: Duration) {
    if let Ok(Some(seen)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected callback: {seen:?}");
    }
}
