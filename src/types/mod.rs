//! Data types shared by the HTTP collaborators and the streaming core.
//!
//! - [`quote`]: [`Quote`](quote::Quote), its wire form, and the alias-labelled
//!   variant handed to callbacks
//! - [`proxy`]: parsed proxy settings

pub mod proxy;
pub mod quote;
