//! Subscription registry: instrument id → display alias.
//!
//! The registry is owned by the [`Online`](crate::ws::online::Online)
//! orchestrator and outlives individual connections. Which ids have a wire
//! subscription is tracked per session by the connection manager instead.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Thread-safe map of subscribed instruments to their display aliases.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    aliases: RwLock<HashMap<u64, String>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the alias for `instrument_id`.
    ///
    /// Without an alias the stringified id is used. Returns the previous
    /// alias, if the id was already registered.
    pub fn set(&self, instrument_id: u64, alias: Option<&str>) -> Option<String> {
        let alias = alias.map_or_else(|| instrument_id.to_string(), str::to_owned);
        self.aliases.write().insert(instrument_id, alias)
    }

    /// The alias for `instrument_id`, or the stringified id when unknown.
    pub fn resolve_alias(&self, instrument_id: u64) -> String {
        self.aliases
            .read()
            .get(&instrument_id)
            .cloned()
            .unwrap_or_else(|| instrument_id.to_string())
    }

    /// Drop the entry for `instrument_id`. Returns its alias, if any.
    pub fn remove(&self, instrument_id: u64) -> Option<String> {
        self.aliases.write().remove(&instrument_id)
    }

    /// Whether `instrument_id` is registered.
    pub fn contains(&self, instrument_id: u64) -> bool {
        self.aliases.read().contains_key(&instrument_id)
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.aliases.read().len()
    }

    /// Whether no instrument is registered.
    pub fn is_empty(&self) -> bool {
        self.aliases.read().is_empty()
    }

    /// All `(instrument_id, alias)` pairs, sorted by id.
    pub fn entries(&self) -> Vec<(u64, String)> {
        let mut out: Vec<_> = self
            .aliases
            .read()
            .iter()
            .map(|(id, alias)| (*id, alias.clone()))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }
}
