//! Stream events and the dispatcher delivering them to caller callbacks.
//!
//! Background tasks (the read loop, the connect attempt, snapshot fetches)
//! never call into user code directly. They push [`StreamEvent`]s onto a
//! channel; the [`Online`] pump task enriches them into [`OnlineEvent`]s and
//! hands them to the [`Dispatcher`], which invokes the [`OnlineHandler`].
//! Events therefore reach the handler in the order they were produced: an
//! error that ends a connection is always delivered before its `Closed`.

use std::sync::Arc;

use crate::error::InvestingError;
use crate::types::quote::{AliasedQuote, Quote};
use crate::ws::online::Online;

/// Event produced by the connection layer.
#[derive(Debug)]
pub enum StreamEvent {
    /// The socket is open.
    Opened,
    /// A decoded quote (or a snapshot).
    Quote(Quote),
    /// The server answered a keep-alive.
    Heartbeat,
    /// A background failure. The connection stays up unless a `Closed`
    /// follows.
    Error(InvestingError),
    /// The socket closed after having been open.
    Closed,
}

/// Event as delivered to the caller, with quotes labelled by alias.
#[derive(Debug)]
pub enum OnlineEvent {
    Opened,
    Quote(AliasedQuote),
    Heartbeat,
    Error(InvestingError),
    Closed,
}

/// Caller callbacks. Every method defaults to a no-op.
///
/// Callbacks run on a background task, so implementations must be
/// `Send + Sync` and should not block. Each receives the [`Online`] handle
/// the event belongs to, so a handler may e.g. subscribe from `on_open`
/// (by cloning the handle into a spawned task).
pub trait OnlineHandler: Send + Sync + 'static {
    /// The connection opened.
    fn on_open(&self, online: &Online) {
        let _ = online;
    }

    /// A quote arrived.
    fn on_quote(&self, online: &Online, quote: &AliasedQuote) {
        let _ = (online, quote);
    }

    /// The server answered a keep-alive.
    fn on_heartbeat(&self, online: &Online) {
        let _ = online;
    }

    /// Something failed in the background.
    fn on_error(&self, online: &Online, error: &InvestingError) {
        let _ = (online, error);
    }

    /// The connection closed.
    fn on_close(&self, online: &Online) {
        let _ = online;
    }
}

impl OnlineHandler for () {}

/// Routes each [`OnlineEvent`] to the matching [`OnlineHandler`] callback.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn OnlineHandler>,
}

impl Dispatcher {
    /// Create a dispatcher for `handler`.
    pub fn new(handler: Arc<dyn OnlineHandler>) -> Self {
        Self { handler }
    }

    /// Invoke the callback for `event`.
    pub fn dispatch(&self, online: &Online, event: OnlineEvent) {
        match event {
            OnlineEvent::Opened => {
                tracing::debug!("Dispatching open");
                self.handler.on_open(online);
            }
            OnlineEvent::Quote(quote) => {
                tracing::trace!(
                    instrument_id = quote.instrument_id,
                    alias = %quote.alias,
                    "Dispatching quote"
                );
                self.handler.on_quote(online, &quote);
            }
            OnlineEvent::Heartbeat => self.handler.on_heartbeat(online),
            OnlineEvent::Error(error) => {
                tracing::debug!(error = %error, "Dispatching error");
                self.handler.on_error(online, &error);
            }
            OnlineEvent::Closed => {
                tracing::debug!("Dispatching close");
                self.handler.on_close(online);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
