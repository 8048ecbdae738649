//! HTTP endpoint implementations.
//!
//! Each sub-module adds `async` methods to
//! [`InvestingClient`](crate::client::InvestingClient) via `impl` blocks.
//! These are the collaborators of the streaming core: they run once per
//! connection (discovery) or once per subscription (snapshot), never on the
//! hot path.
//!
//! | Module | Endpoint | Description |
//! |---|---|---|
//! | [`streamer`] | `GET /api/editions/streamer` | Stream server discovery |
//! | [`snapshot`] | instrument page | Point-in-time quote scraped from HTML |

pub mod snapshot;
pub mod streamer;
