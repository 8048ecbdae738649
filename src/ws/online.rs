//! Streaming orchestrator: the public entry point for live quotes.
//!
//! # Example
//!
//! ```no_run
//! use investing_rs::types::quote::AliasedQuote;
//! use investing_rs::ws::events::OnlineHandler;
//! use investing_rs::ws::online::Online;
//!
//! struct Printer;
//!
//! impl OnlineHandler for Printer {
//!     fn on_open(&self, online: &Online) {
//!         let online = online.clone();
//!         tokio::spawn(async move {
//!             let link = Some("/indices/us-30-futures");
//!             if let Err(e) = online.subscribe(8873, Some("US 30"), link).await {
//!                 eprintln!("subscribe failed: {e}");
//!             }
//!         });
//!     }
//!
//!     fn on_quote(&self, _online: &Online, quote: &AliasedQuote) {
//!         println!("{} last={:?} change={:?}", quote.alias, quote.last, quote.change);
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> investing_rs::error::Result<()> {
//! let online = Online::new(Printer)?;
//! online.connect().await;
//! tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//! online.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, mpsc};

use crate::client::InvestingClient;
use crate::error::Result;
use crate::types::quote::AliasedQuote;
use crate::ws::config::OnlineConfig;
use crate::ws::connection::{ConnectionManager, ConnectionState};
use crate::ws::events::{Dispatcher, OnlineEvent, OnlineHandler, StreamEvent};
use crate::ws::registry::SubscriptionRegistry;

struct Inner {
    client: InvestingClient,
    connection: ConnectionManager,
    registry: SubscriptionRegistry,
    /// Discovered stream server, cached for the life of the orchestrator.
    stream_server: Mutex<Option<String>>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

/// Live quote client: one stream connection, many instrument subscriptions.
///
/// Cheap to clone; clones share the same connection and registry. Must be
/// created inside a Tokio runtime.
#[derive(Clone)]
pub struct Online {
    inner: Arc<Inner>,
}

impl Online {
    /// Create a client for the public endpoints.
    pub fn new(handler: impl OnlineHandler) -> Result<Self> {
        Self::with_config(OnlineConfig::default(), handler)
    }

    /// Create a client with an explicit configuration.
    pub fn with_config(config: OnlineConfig, handler: impl OnlineHandler) -> Result<Self> {
        let client = InvestingClient::with_base_urls(
            config.api_base_url.as_str(),
            config.web_base_url.as_str(),
            config.proxy.as_ref(),
        )?;
        let (events, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            client,
            stream_server: Mutex::new(config.stream_server.clone()),
            connection: ConnectionManager::new(config, events.clone()),
            registry: SubscriptionRegistry::new(),
            events,
        });

        spawn_pump(
            Arc::downgrade(&inner),
            rx,
            Dispatcher::new(Arc::new(handler)),
        );
        Ok(Self { inner })
    }

    /// Resolve the stream server (once) and open the connection.
    ///
    /// Returns once the attempt is under way; the outcome arrives as
    /// `on_open` or `on_error`. Failures never propagate to the caller.
    pub async fn connect(&self) {
        let result = async {
            let server = self.stream_server().await?;
            self.inner.connection.connect(&server).await
        }
        .await;

        if let Err(e) = result {
            if e.is_connection() {
                tracing::warn!(error = %e, "Connect failed");
            } else {
                tracing::error!(error = %e, "Connect failed");
            }
            self.emit(StreamEvent::Error(e));
        }
    }

    /// Close the connection. Safe to call in any state.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    /// Subscribe to live quotes for `instrument_id`.
    ///
    /// The alias (default: the id itself) is registered immediately. With a
    /// `link` to the instrument page, a snapshot quote is fetched and
    /// delivered first; a failed snapshot is skipped silently. Subscribing an
    /// id twice on the same connection only updates its alias.
    ///
    /// Fails with [`NotConnected`](crate::error::InvestingError::NotConnected)
    /// when the connection is not open.
    pub async fn subscribe(
        &self,
        instrument_id: u64,
        alias: Option<&str>,
        link: Option<&str>,
    ) -> Result<()> {
        self.inner.registry.set(instrument_id, alias);

        if let Some(link) = link {
            match self.inner.client.get_snapshot(instrument_id, link).await {
                Ok(quote) => self.emit(StreamEvent::Quote(quote)),
                Err(e) => {
                    tracing::debug!(instrument_id, error = %e, "Snapshot unavailable");
                }
            }
        }

        if !self.inner.connection.subscribe_once(instrument_id).await? {
            tracing::debug!(instrument_id, "Already subscribed, alias updated");
        }
        Ok(())
    }

    /// Stop live quotes for `instrument_id` and forget its alias.
    pub async fn unsubscribe(&self, instrument_id: u64) -> Result<()> {
        self.inner.registry.remove(instrument_id);
        self.inner.connection.unsubscribe_event(instrument_id).await
    }

    /// The stream server address, discovering it on first use.
    ///
    /// Concurrent callers share a single discovery request.
    pub async fn stream_server(&self) -> Result<String> {
        let mut cached = self.inner.stream_server.lock().await;
        if let Some(server) = cached.as_ref() {
            return Ok(server.clone());
        }

        let server = self.inner.client.get_stream_server().await?;
        *cached = Some(server.clone());
        Ok(server)
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.connection.state().await
    }

    /// The subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// The HTTP client used for discovery and snapshots.
    pub fn client(&self) -> &InvestingClient {
        &self.inner.client
    }

    fn emit(&self, event: StreamEvent) {
        if self.inner.events.send(event).is_err() {
            tracing::trace!("Event pump stopped");
        }
    }

    /// Label quotes with their alias.
    fn enrich(&self, event: StreamEvent) -> OnlineEvent {
        match event {
            StreamEvent::Opened => OnlineEvent::Opened,
            StreamEvent::Quote(quote) => OnlineEvent::Quote(AliasedQuote {
                alias: self.inner.registry.resolve_alias(quote.instrument_id),
                quote,
            }),
            StreamEvent::Heartbeat => OnlineEvent::Heartbeat,
            StreamEvent::Error(e) => OnlineEvent::Error(e),
            StreamEvent::Closed => OnlineEvent::Closed,
        }
    }
}

impl std::fmt::Debug for Online {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Online")
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

/// Deliver events to the handler until every [`Online`] handle is dropped.
fn spawn_pump(
    inner: Weak<Inner>,
    mut rx: mpsc::UnboundedReceiver<StreamEvent>,
    dispatcher: Dispatcher,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let online = Online { inner };
            let event = online.enrich(event);
            dispatcher.dispatch(&online, event);
        }
        tracing::debug!("Event pump stopped");
    });
}
