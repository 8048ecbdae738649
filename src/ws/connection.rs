//! Connection manager: owns the single stream socket.
//!
//! # Lifecycle
//!
//! ```text
//!   Disconnected ──connect──▶ Connecting ──handshake ok──▶ Open
//!        ▲                        │                          │
//!        │◀──── handshake error ──┘                          │
//!        │                                                   │
//!        └──── disconnect / peer close ◀──── Closing ◀───────┘
//! ```
//!
//! Every transition happens under one [`tokio::sync::Mutex`]. The lock is
//! held across transitions and frame sends, never across the read loop.
//!
//! Each connect attempt gets a session number, a fresh
//! [`CancellationToken`] and a fresh write half slot. The session task opens
//! the socket, starts the [`HeartbeatKeeper`], and then runs the read loop.
//! Whoever moves a session out of `Open` (a `disconnect` call, or the read
//! loop when the peer goes away) emits its single [`StreamEvent::Closed`].
//!
//! Session tokens are children of one manager-wide token, so dropping the
//! manager stops every task without touching the session lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::constants::stream::{SESSION_TAG_LIMIT, SESSION_TOKEN_ALPHABET, SESSION_TOKEN_LEN};
use crate::error::{InvestingError, Result};
use crate::ws::config::OnlineConfig;
use crate::ws::decoder::{self, Frame};
use crate::ws::events::StreamEvent;
use crate::ws::frames::ControlFrame;
use crate::ws::heartbeat::HeartbeatKeeper;
use crate::ws::transport::{self, WsStream};

type WriterHalf = SplitSink<WsStream, Message>;
type ReaderHalf = SplitStream<WsStream>;

/// Write half of the socket, shared with the heartbeat keeper. `None` once
/// the session is closing.
pub type SharedWriter = Arc<Mutex<Option<WriterHalf>>>;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

struct Session {
    state: ConnectionState,
    /// Incremented on every connect attempt.
    id: u64,
    writer: SharedWriter,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    /// Instruments with a wire subscription on this session.
    subscribed: HashSet<u64>,
}

impl Session {
    fn idle() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            id: 0,
            writer: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            task: None,
            heartbeat: None,
            subscribed: HashSet::new(),
        }
    }

    fn is(&self, id: u64, state: ConnectionState) -> bool {
        self.id == id && self.state == state
    }
}

struct Shared {
    config: OnlineConfig,
    session: Mutex<Session>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl Shared {
    fn emit(&self, event: StreamEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owner of the single stream socket.
///
/// Results of background activity are reported on the event channel given
/// to [`new`](Self::new); `connect` returns as soon as the attempt is under
/// way.
///
/// # Example
///
/// ```no_run
/// use investing_rs::ws::config::OnlineConfig;
/// use investing_rs::ws::connection::ConnectionManager;
/// use investing_rs::ws::events::StreamEvent;
/// use tokio::sync::mpsc;
///
/// # #[tokio::main]
/// # async fn main() -> investing_rs::error::Result<()> {
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let manager = ConnectionManager::new(OnlineConfig::default(), tx);
/// manager.connect("stream1.example.com").await?;
///
/// while let Some(event) = rx.recv().await {
///     if let StreamEvent::Opened = event {
///         manager.subscribe_event(8873).await?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(config: OnlineConfig, events: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                session: Mutex::new(Session::idle()),
                events,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.shared.session.lock().await.state
    }

    /// Start connecting to `server` unless a connection already exists.
    ///
    /// Returns once the attempt is dispatched. Success is reported as
    /// [`StreamEvent::Opened`], failure as [`StreamEvent::Error`].
    pub async fn connect(&self, server: &str) -> Result<()> {
        let server = server.trim();
        if server.is_empty() {
            return Err(InvestingError::InvalidArgument(
                "stream server address is empty".into(),
            ));
        }

        let mut session = self.shared.session.lock().await;
        if session.state != ConnectionState::Disconnected {
            tracing::debug!(state = %session.state, "Connect ignored, connection not idle");
            return Ok(());
        }

        let url = session_url(&self.shared.config.stream_scheme, server);
        session.id += 1;
        session.state = ConnectionState::Connecting;
        session.cancel = self.shutdown.child_token();
        session.writer = Arc::new(Mutex::new(None));
        session.subscribed.clear();

        tracing::info!(session = session.id, %url, "Connecting to stream server");

        let task = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            session.id,
            url,
            session.cancel.clone(),
        ));
        session.task = Some(task);
        Ok(())
    }

    /// Close the connection. Safe to call in any state.
    ///
    /// Waits (bounded by `close_timeout`) for the close frame and the
    /// background tasks, and emits [`StreamEvent::Closed`] if the connection
    /// had been open.
    pub async fn disconnect(&self) {
        let (id, was_open, writer, task, heartbeat) = {
            let mut session = self.shared.session.lock().await;
            match session.state {
                ConnectionState::Disconnected | ConnectionState::Closing => return,
                ConnectionState::Connecting | ConnectionState::Open => {}
            }

            let was_open = session.state == ConnectionState::Open;
            session.state = ConnectionState::Closing;
            session.cancel.cancel();
            session.subscribed.clear();

            (
                session.id,
                was_open,
                Arc::clone(&session.writer),
                session.task.take(),
                session.heartbeat.take(),
            )
        };

        let bound = self.shared.config.close_timeout;
        close_writer(&writer, bound).await;
        if let Some(task) = task {
            join_bounded(task, bound, "session").await;
        }
        if let Some(heartbeat) = heartbeat {
            join_bounded(heartbeat, bound, "heartbeat").await;
        }
        // A send stuck past the bound left the write half in place.
        if let Ok(mut slot) = writer.try_lock() {
            slot.take();
        }

        let mut session = self.shared.session.lock().await;
        if session.is(id, ConnectionState::Closing) {
            session.state = ConnectionState::Disconnected;
        }
        if was_open {
            self.shared.emit(StreamEvent::Closed);
        }
        tracing::info!(session = id, "Disconnected from stream server");
    }

    /// Ask the server for updates on `instrument_id`.
    pub async fn subscribe_event(&self, instrument_id: u64) -> Result<()> {
        let session = self.shared.session.lock().await;
        if session.state != ConnectionState::Open {
            return Err(InvestingError::NotConnected);
        }

        send_frame(&session, &ControlFrame::subscribe(instrument_id)).await?;
        tracing::debug!(instrument_id, "Subscribed");
        Ok(())
    }

    /// Ask the server for updates on `instrument_id` unless this session
    /// already has. Returns whether a frame was sent.
    ///
    /// The record of sent subscriptions lives with the session and starts
    /// empty on every connect.
    pub async fn subscribe_once(&self, instrument_id: u64) -> Result<bool> {
        let mut session = self.shared.session.lock().await;
        if session.state != ConnectionState::Open {
            return Err(InvestingError::NotConnected);
        }
        if session.subscribed.contains(&instrument_id) {
            tracing::debug!(instrument_id, session = session.id, "Already subscribed");
            return Ok(false);
        }

        send_frame(&session, &ControlFrame::subscribe(instrument_id)).await?;
        session.subscribed.insert(instrument_id);
        tracing::debug!(instrument_id, "Subscribed");
        Ok(true)
    }

    /// Stop updates on `instrument_id`.
    pub async fn unsubscribe_event(&self, instrument_id: u64) -> Result<()> {
        let mut session = self.shared.session.lock().await;
        if session.state != ConnectionState::Open {
            return Err(InvestingError::NotConnected);
        }

        session.subscribed.remove(&instrument_id);
        send_frame(&session, &ControlFrame::unsubscribe(instrument_id)).await?;
        tracing::debug!(instrument_id, "Unsubscribed");
        Ok(())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Ok(mut session) = self.shared.session.try_lock() {
            if let Some(task) = session.task.take() {
                task.abort();
            }
            if let Some(heartbeat) = session.heartbeat.take() {
                heartbeat.abort();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Open the socket, then read until it closes or the session is cancelled.
async fn run_session(shared: Arc<Shared>, id: u64, url: String, cancel: CancellationToken) {
    let timeout = shared.config.connect_timeout;
    let opened = tokio::select! {
        () = cancel.cancelled() => return,
        res = tokio::time::timeout(timeout, transport::open(&url, shared.config.proxy.as_ref())) => {
            res.unwrap_or_else(|_| {
                Err(InvestingError::Connection(format!("handshake timed out after {timeout:?}")))
            })
        }
    };

    let ws = match opened {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(session = id, error = %e, "Stream connection failed");
            let mut session = shared.session.lock().await;
            if session.is(id, ConnectionState::Connecting) {
                session.state = ConnectionState::Disconnected;
                session.task = None;
                shared.emit(StreamEvent::Error(e));
            }
            return;
        }
    };

    let (write, read) = ws.split();
    {
        let mut session = shared.session.lock().await;
        if !session.is(id, ConnectionState::Connecting) {
            // disconnect() won the race; drop the fresh socket.
            drop(session);
            let mut write = write;
            let _ = write.close().await;
            return;
        }

        *session.writer.lock().await = Some(write);
        session.state = ConnectionState::Open;
        match HeartbeatKeeper::new(
            Arc::clone(&session.writer),
            shared.config.heartbeat_interval,
            cancel.clone(),
        ) {
            Ok(keeper) => session.heartbeat = Some(keeper.spawn()),
            Err(e) => shared.emit(StreamEvent::Error(e)),
        }
        shared.emit(StreamEvent::Opened);
    }
    tracing::info!(session = id, "Stream connection open");

    read_loop(&shared, id, read, &cancel).await;

    let writer = {
        let mut session = shared.session.lock().await;
        if !session.is(id, ConnectionState::Open) {
            return;
        }
        session.state = ConnectionState::Disconnected;
        session.heartbeat = None;
        session.task = None;
        session.subscribed.clear();

        if cancel.is_cancelled() {
            // Only the manager's drop cancels an open session.
            tracing::debug!(session = id, "Stream session stopped");
        } else {
            cancel.cancel();
            shared.emit(StreamEvent::Closed);
            tracing::info!(session = id, "Stream connection closed by peer");
        }
        Arc::clone(&session.writer)
    };
    close_writer(&writer, shared.config.close_timeout).await;
}

/// Forward decoded frames until the socket ends or `cancel` fires.
///
/// A frame that fails to decode is reported and skipped; only a socket error
/// or end of stream ends the loop.
async fn read_loop(shared: &Shared, id: u64, mut read: ReaderHalf, cancel: &CancellationToken) {
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => match decoder::decode(text.as_str()) {
                Ok(Frame::Quote(quote)) => shared.emit(StreamEvent::Quote(quote)),
                Ok(Frame::Heartbeat) => shared.emit(StreamEvent::Heartbeat),
                Ok(Frame::Unrecognized) => {
                    tracing::trace!(session = id, "Ignoring frame: {text}");
                }
                Err(e) => {
                    tracing::warn!(session = id, error = %e, "Failed to decode frame");
                    shared.emit(StreamEvent::Error(e));
                }
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(session = id, ?frame, "Stream closed by server");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!(session = id, error = %e, "Stream socket error");
                shared.emit(StreamEvent::Error(e.into()));
                break;
            }
            None => {
                tracing::info!(session = id, "Stream ended");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{scheme}://{server}/echo/{tag}/{token}/websocket` with a fresh random
/// tag in `0..1000` and an 8-character lowercase alphanumeric token.
pub fn session_url(scheme: &str, server: &str) -> String {
    let mut rng = rand::rng();
    let tag = rng.random_range(0..SESSION_TAG_LIMIT);
    let token: String = (0..SESSION_TOKEN_LEN)
        .map(|_| {
            let i = rng.random_range(0..SESSION_TOKEN_ALPHABET.len());
            char::from(SESSION_TOKEN_ALPHABET[i])
        })
        .collect();

    format!("{scheme}://{server}/echo/{tag}/{token}/websocket")
}

async fn send_frame(session: &Session, frame: &ControlFrame) -> Result<()> {
    let text = frame.encode()?;
    let mut writer = session.writer.lock().await;
    let writer = writer.as_mut().ok_or(InvestingError::NotConnected)?;
    writer.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Take the write half out of its slot and close it, giving up after
/// `bound`. Later heartbeat or control sends find the slot empty.
async fn close_writer(writer: &SharedWriter, bound: Duration) {
    let close = async {
        if let Some(mut write) = writer.lock().await.take() {
            if let Err(e) = write.send(Message::Close(None)).await {
                tracing::debug!(error = %e, "Close frame not sent");
            }
        }
    };
    if tokio::time::timeout(bound, close).await.is_err() {
        tracing::warn!(?bound, "Close frame not sent in time, dropping the socket");
    }
}

async fn join_bounded(mut handle: JoinHandle<()>, bound: Duration, what: &str) {
    if tokio::time::timeout(bound, &mut handle).await.is_err() {
        tracing::warn!(task = what, ?bound, "Background task did not stop in time, aborting");
        handle.abort();
    }
}
