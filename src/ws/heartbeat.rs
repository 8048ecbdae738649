//! Heartbeat keeper.
//!
//! Sends the keep-alive control frame on a fixed period while a connection
//! is open. The keeper shares the socket's write half with the connection
//! manager; once the manager takes the writer away (or cancels the token)
//! no further frame is sent.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::ws::connection::SharedWriter;
use crate::ws::frames::ControlFrame;

/// Periodic keep-alive sender for one connection.
pub struct HeartbeatKeeper {
    writer: SharedWriter,
    interval: Duration,
    cancel: CancellationToken,
    frame: String,
}

impl HeartbeatKeeper {
    /// Create a keeper writing to `writer` every `interval` until `cancel`
    /// fires.
    pub fn new(writer: SharedWriter, interval: Duration, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            writer,
            interval,
            cancel,
            frame: ControlFrame::heartbeat().encode()?,
        })
    }

    /// Run the keeper on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Send a heartbeat every period until cancelled. The first one goes out
    /// immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Heartbeat keeper cancelled");
                    break;
                }
                _ = ticker.tick() => self.beat().await,
            }
        }
    }

    async fn beat(&self) {
        let mut guard = self.writer.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(writer) = guard.as_mut() else {
            return;
        };

        // A failure here races shutdown; the read loop reports real faults.
        // Never hold the write half longer than one period.
        let send = writer.send(Message::Text(self.frame.clone().into()));
        match tokio::time::timeout(self.interval, send).await {
            Ok(Ok(())) => tracing::trace!("Heartbeat sent"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Heartbeat send failed"),
            Err(_) => tracing::debug!(interval = ?self.interval, "Heartbeat send timed out"),
        }
    }
}
