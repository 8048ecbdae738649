//! Real-time quote streaming over the Investing.com WebSocket feed.
//!
//! The stream server speaks a SockJS-style text protocol: control frames
//! are JSON objects sent as escaped string literals, and updates arrive
//! wrapped in an `a[...]` envelope with doubly-escaped JSON inside.
//!
//! ## Layers
//!
//! - [`online`]: [`Online`](online::Online), the public façade: discovers the
//!   stream server, owns the subscription registry, labels quotes with their
//!   aliases, and drives the caller's [`OnlineHandler`](events::OnlineHandler).
//! - [`connection`]: the single socket, its state machine, and the read loop.
//! - [`heartbeat`]: the one-second keep-alive sender.
//! - [`decoder`]: raw frame → quote / heartbeat / unrecognized.
//! - [`frames`]: subscribe, unsubscribe, and heartbeat control frames.
//! - [`registry`]: instrument id → alias.
//! - [`events`]: event types and the callback dispatcher.
//! - [`config`]: timeouts, proxy, and endpoint overrides.
//!
//! ## Concurrency
//!
//! Each open connection runs two background tasks, the read loop and the
//! heartbeat keeper. Both report through one event channel that a single
//! pump task drains into the handler, so callbacks never run concurrently
//! with each other and always observe events in production order.
//!
//! No reconnection or replay is attempted. After `on_close`, call
//! `connect` again and re-subscribe.

pub mod config;
pub mod connection;
pub mod decoder;
pub mod events;
pub mod frames;
pub mod heartbeat;
pub mod online;
pub mod registry;
pub mod transport;
