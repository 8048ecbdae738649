//! # investing-rs
//!
//! A Rust client for real-time quotes from the Investing.com streaming feed.
//!
//! One persistent WebSocket carries any number of instrument subscriptions.
//! Frames are decoded into [`Quote`](types::quote::Quote)s, labelled with the
//! caller's alias for the instrument, and delivered to an
//! [`OnlineHandler`](ws::events::OnlineHandler).
//!
//! ## Quick Start
//!
//! ```no_run
//! use investing_rs::ws::online::Online;
//!
//! #[tokio::main]
//! async fn main() -> investing_rs::error::Result<()> {
//!     // `()` ignores every event; implement `OnlineHandler` to receive them.
//!     let online = Online::new(())?;
//!     online.connect().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod constants;
pub mod error;
pub mod types;
pub mod ws;

/// Re-export the HTTP client at crate root for convenience.
pub use client::InvestingClient;
/// Re-export the error type and Result alias.
pub use error::{InvestingError, Result};
/// Re-export the streaming entry points.
pub use ws::events::OnlineHandler;
pub use ws::online::Online;
