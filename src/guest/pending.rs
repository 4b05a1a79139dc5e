//! Pending request table.
//!
//! Maps opaque request IDs to single-use resolution channels. Any
//! request/response protocol over an asynchronous transport can use it:
//! register an ID before sending, settle it when the matching response
//! arrives. Entries are removed before they are resolved, so each one
//! settles at most once.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// A single pending entry with its creation timestamp.
struct PendingEntry<T> {
    sender: oneshot::Sender<T>,
    created_at: Instant,
}

/// Table of in-flight requests awaiting a response.
///
/// With a TTL configured, [`PendingTable::reap_expired`] resolves entries
/// older than the TTL. Without one, entries live until settled or cancelled.
pub struct PendingTable<T> {
    entries: DashMap<String, PendingEntry<T>>,
    ttl: Option<Duration>,
}

impl<T> PendingTable<T> {
    /// Create an empty table
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Register an ID and return the receiving half of its channel.
    ///
    /// Re-registering a live ID drops the earlier entry; its receiver then
    /// observes a closed channel.
    pub fn register(&self, id: impl Into<String>) -> oneshot::Receiver<T> {
        let (sender, receiver) = oneshot::channel();
        self.entries.insert(
            id.into(),
            PendingEntry {
                sender,
                created_at: Instant::now(),
            },
        );
        receiver
    }

    /// Resolve an entry with `value`.
    ///
    /// Returns `false` if the ID is unknown or was already settled. An entry
    /// whose receiver has been dropped still counts as settled.
    pub fn settle(&self, id: &str, value: T) -> bool {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                let _ = entry.sender.send(value);
                true
            }
            None => false,
        }
    }

    /// Drop an entry without resolving it
    pub fn cancel(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Resolve every entry older than the TTL with `on_expire(id)`.
    ///
    /// Returns the number of entries reaped. A no-op without a TTL.
    pub fn reap_expired<F>(&self, mut on_expire: F) -> usize
    where
        F: FnMut(&str) -> T,
    {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.created_at.elapsed() >= ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut reaped = 0;
        for id in expired {
            if let Some((id, entry)) = self.entries.remove(&id) {
                let _ = entry.sender.send(on_expire(&id));
                reaped += 1;
            }
        }
        reaped
    }

    /// Check if an ID is pending
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for PendingTable<T> {
    fn default() -> Self {
        Self::new(None)
    }
}
