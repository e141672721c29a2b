use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use baton_clock::{Clock, DurationSecs, System, UnixTime};
use dashmap::DashMap;

use super::SessionStore;
use crate::error::StoreError;

struct Entry {
    value: Vec<u8>,
    expires_at: UnixTime,
}

/// A process-local session store
///
/// Entries are expired lazily, when next read. Writes also sweep out every
/// expired entry once per purge interval (one minute by default), so entries
/// that are never read again do not accumulate.
/// [`purge_expired`][Self::purge_expired] sweeps on demand.
///
/// Rotation removes the old entry and inserts its successor without yielding
/// in between. Removal from the map is atomic per key, so only one of several
/// concurrent rotations of the same key can observe the entry.
pub struct InMemorySessionStore<C = System> {
    entries: DashMap<String, Entry>,
    clock: C,
    purge_interval: DurationSecs,
    next_purge: AtomicU64,
}

/// How often writes sweep out expired entries unless configured otherwise
pub const DEFAULT_PURGE_INTERVAL: DurationSecs = DurationSecs(60);

impl<C: fmt::Debug> fmt::Debug for InMemorySessionStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("entries", &self.entries.len())
            .field("clock", &self.clock)
            .field("purge_interval", &self.purge_interval)
            .finish()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    /// An empty store using the system clock
    pub fn new() -> Self {
        Self::with_clock(System)
    }
}

impl<C: Clock> InMemorySessionStore<C> {
    /// An empty store which judges expiry against `clock`
    pub fn with_clock(clock: C) -> Self {
        let next_purge = AtomicU64::new((clock.now() + DEFAULT_PURGE_INTERVAL).0);
        Self {
            entries: DashMap::new(),
            clock,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            next_purge,
        }
    }

    /// Sets how often writes sweep out expired entries
    pub fn with_purge_interval(self, purge_interval: DurationSecs) -> Self {
        self.next_purge
            .store((self.clock.now() + purge_interval).0, Ordering::Relaxed);
        Self {
            purge_interval,
            ..self
        }
    }

    /// Drops every entry whose time to live has elapsed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        tracing::trace!(purged, "purged expired sessions");
        purged
    }

    fn purge_if_due(&self, now: UnixTime) {
        let due = self.next_purge.load(Ordering::Relaxed);
        if now.0 < due {
            return;
        }

        let next = (now + self.purge_interval).0;
        if self
            .next_purge
            .compare_exchange(due, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_expired();
        }
    }

    /// The number of entries held, including any not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> SessionStore for InMemorySessionStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries
                .remove_if(key, |_, entry| entry.expires_at <= now);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: DurationSecs) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.purge_if_due(now);

        let entry = Entry {
            value: value.to_vec(),
            expires_at: now + ttl,
        };

        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(*key);
        }

        Ok(())
    }

    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl: DurationSecs,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();

        match self.entries.remove(old_key) {
            Some((_, old)) if old.expires_at > now => {}
            _ => return Ok(false),
        }

        self.purge_if_due(now);

        let entry = Entry {
            value: value.to_vec(),
            expires_at: now + ttl,
        };
        self.entries.insert(new_key.to_owned(), entry);

        Ok(true)
    }
}
