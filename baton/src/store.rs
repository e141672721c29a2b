//! Key/value storage for refresh sessions
//!
//! The [`SessionStore`] trait is the narrow capability the rest of the crate
//! consumes: opaque byte values with a per-key time to live, plus a single
//! atomic `rotate` primitive used to consume a refresh token and replace it
//! with its successor.

use async_trait::async_trait;
use baton_clock::DurationSecs;

use crate::error::StoreError;

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::{InMemorySessionStore, DEFAULT_PURGE_INTERVAL};
#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub use self::redis::RedisSessionStore;

/// A key/value cache with per-key expiration
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`, if it is present and unexpired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`, replacing any existing value, to expire
    /// after `ttl`
    async fn set(&self, key: &str, value: &[u8], ttl: DurationSecs) -> Result<(), StoreError>;

    /// Removes every key in `keys`; keys that are already absent are ignored
    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// If `old_key` is present, removes it and writes `value` under
    /// `new_key` as one indivisible step
    ///
    /// Returns `false`, without writing anything, when `old_key` was absent.
    /// Of any number of concurrent calls naming the same `old_key`, at most
    /// one returns `true`.
    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl: DurationSecs,
    ) -> Result<bool, StoreError>;
}
