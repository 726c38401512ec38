//! Channel identity table.
//!
//! Providers hand out channel ids that are only meaningful to themselves and
//! may change whenever a connection is rebuilt. The orchestrator hides them
//! behind synthetic ids drawn from a per-manager [`ChannelIdCounter`]:
//!
//! ```text
//!  synthetic id ──▶ (provider id, provider-local id, metadata, roles)
//!       1       ──▶ (7, 0, "#ops",   watchdog)
//!       2       ──▶ (7, 1, "#chat",  updates)
//!       3       ──▶ (9, 4, "PM: x",  private)
//! ```
//!
//! At most one entry exists per (provider id, provider-local id) pair, and a
//! synthetic id is never handed out twice.

use std::collections::BTreeMap;
use std::ops::Range;

use tgs_core::{ChannelId, ChannelRepresentation, ConnectionId};

/// One row of the [`ChannelTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMapping {
    /// Connection that owns the channel.
    pub provider_id: ConnectionId,
    /// The provider's own id for the channel.
    pub provider_channel_id: ChannelId,
    /// Receives watchdog broadcasts.
    pub is_watchdog_channel: bool,
    /// Receives update broadcasts.
    pub is_updates_channel: bool,
    /// Channel metadata. `real_id` holds the synthetic id.
    pub channel: ChannelRepresentation,
}

/// Synthetic id allocator. Ids start at 1.
#[derive(Debug)]
pub struct ChannelIdCounter {
    next: ChannelId,
}

impl Default for ChannelIdCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ChannelIdCounter {
    /// Draws a single id.
    pub fn next_id(&mut self) -> ChannelId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Reserves a contiguous block of `count` ids.
    pub fn reserve(&mut self, count: usize) -> Range<ChannelId> {
        let start = self.next;
        self.next += count as ChannelId;
        start..self.next
    }
}

/// Synthetic id → [`ChannelMapping`], ordered by id.
#[derive(Debug, Default)]
pub struct ChannelTable {
    entries: BTreeMap<ChannelId, ChannelMapping>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a mapping by synthetic id.
    pub fn get(&self, id: ChannelId) -> Option<&ChannelMapping> {
        self.entries.get(&id)
    }

    /// Finds the synthetic id of a provider-local channel.
    pub fn find(
        &self,
        provider_id: ConnectionId,
        provider_channel_id: ChannelId,
    ) -> Option<(ChannelId, &ChannelMapping)> {
        self.entries
            .iter()
            .find(|(_, m)| m.provider_id == provider_id && m.provider_channel_id == provider_channel_id)
            .map(|(id, m)| (*id, m))
    }

    /// Inserts `mapping` under `id`, rewriting its `real_id`.
    ///
    /// An existing entry for the same provider-local channel is evicted so
    /// the pair stays unique.
    pub fn insert(&mut self, id: ChannelId, mut mapping: ChannelMapping) {
        if let Some((stale, _)) = self.find(mapping.provider_id, mapping.provider_channel_id) {
            self.entries.remove(&stale);
        }
        mapping.channel.real_id = id;
        self.entries.insert(id, mapping);
    }

    /// Removes every entry owned by `provider_id`, returning how many went.
    pub fn remove_connection(&mut self, provider_id: ConnectionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, m| m.provider_id != provider_id);
        before - self.entries.len()
    }

    /// Snapshot of every mapped channel, ordered by synthetic id.
    pub fn channels(&self) -> Vec<ChannelRepresentation> {
        self.entries.values().map(|m| m.channel.clone()).collect()
    }

    /// Ids of the entries owned by `provider_id`.
    pub fn ids_for(&self, provider_id: ConnectionId) -> Vec<ChannelId> {
        self.ids_where(|m| m.provider_id == provider_id)
    }

    /// Ids of watchdog-role channels.
    pub fn watchdog_ids(&self) -> Vec<ChannelId> {
        self.ids_where(|m| m.is_watchdog_channel)
    }

    /// Ids of updates-role channels.
    pub fn updates_ids(&self) -> Vec<ChannelId> {
        self.ids_where(|m| m.is_updates_channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &ChannelMapping)> {
        self.entries.iter().map(|(id, m)| (*id, m))
    }

    fn ids_where(&self, predicate: impl Fn(&ChannelMapping) -> bool) -> Vec<ChannelId> {
        self.entries
            .iter()
            .filter(|(_, m)| predicate(m))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(provider_id: ConnectionId, provider_channel_id: ChannelId, name: &str) -> ChannelMapping {
        ChannelMapping {
            provider_id,
            provider_channel_id,
            is_watchdog_channel: false,
            is_updates_channel: false,
            channel: ChannelRepresentation {
                real_id: provider_channel_id,
                friendly_name: name.into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_counter_reserve_is_contiguous() {
        let mut counter = ChannelIdCounter::default();
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.reserve(3), 2..5);
        assert_eq!(counter.next_id(), 5);
        assert_eq!(counter.reserve(0), 6..6);
    }

    #[test]
    fn test_insert_rewrites_real_id() {
        let mut table = ChannelTable::new();
        table.insert(10, mapping(1, 0, "#a"));
        assert_eq!(table.get(10).unwrap().channel.real_id, 10);
        assert_eq!(table.find(1, 0).map(|(id, _)| id), Some(10));
        assert!(table.find(1, 1).is_none());
    }

    #[test]
    fn test_insert_keeps_pair_unique() {
        let mut table = ChannelTable::new();
        table.insert(1, mapping(1, 0, "#a"));
        table.insert(2, mapping(1, 0, "#a"));
        assert_eq!(table.len(), 1);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
    }

    #[test]
    fn test_remove_connection_only_touches_owner() {
        let mut table = ChannelTable::new();
        table.insert(1, mapping(1, 0, "#a"));
        table.insert(2, mapping(2, 0, "#b"));
        table.insert(3, mapping(1, 1, "#c"));

        assert_eq!(table.remove_connection(1), 2);
        assert_eq!(table.ids_for(2), vec![2]);
        assert!(table.ids_for(1).is_empty());
    }

    #[test]
    fn test_role_queries() {
        let mut table = ChannelTable::new();
        let mut wd = mapping(1, 0, "#wd");
        wd.is_watchdog_channel = true;
        let mut up = mapping(1, 1, "#up");
        up.is_updates_channel = true;
        table.insert(4, wd);
        table.insert(5, up);
        table.insert(6, mapping(1, 2, "#plain"));

        assert_eq!(table.watchdog_ids(), vec![4]);
        assert_eq!(table.updates_ids(), vec![5]);
        let names: Vec<_> = table.channels().into_iter().map(|c| c.friendly_name).collect();
        assert_eq!(names, vec!["#wd", "#up", "#plain"]);
    }
}
