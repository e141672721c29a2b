use std::fmt;

use async_trait::async_trait;
use baton_clock::DurationSecs;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};

use super::SessionStore;
use crate::error::StoreError;

const DEFAULT_KEY_PREFIX: &str = "baton:refresh:";

const ROTATE_SCRIPT: &str = r"
if redis.call('DEL', KEYS[1]) == 1 then
    redis.call('SET', KEYS[2], ARGV[1], 'EX', ARGV[2])
    return 1
end
return 0
";

/// A session store backed by Redis
///
/// Expiry is delegated to Redis key TTLs. Rotation runs as a Lua script, so
/// the check, delete, and write happen atomically on the server.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    prefix: String,
    rotate_script: Script,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisSessionStore {
    /// Connects to the Redis server at `url` and checks that it responds
    ///
    /// # Errors
    ///
    /// The URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(StoreError::new)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::new)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::new)?;

        tracing::debug!("redis session store connected");

        Ok(Self {
            conn,
            prefix: DEFAULT_KEY_PREFIX.to_owned(),
            rotate_script: Script::new(ROTATE_SCRIPT),
        })
    }

    /// Namespaces every key with `prefix` instead of `baton:refresh:`
    pub fn with_key_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Redis rejects an `EX` of zero
fn ttl_secs(ttl: DurationSecs) -> u64 {
    ttl.0.max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(self.key(key)).await.map_err(StoreError::new)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: DurationSecs) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex(self.key(key), value, ttl_secs(ttl))
            .await
            .map_err(StoreError::new)
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(StoreError::new)
    }

    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl: DurationSecs,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .rotate_script
            .key(self.key(old_key))
            .key(self.key(new_key))
            .arg(value)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::new)?;

        Ok(swapped == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> color_eyre::Result<RedisSessionStore> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let prefix = format!("baton:test:{}:", std::process::id());
        Ok(RedisSessionStore::connect(&url).await?.with_key_prefix(prefix))
    }

    #[test]
    fn zero_ttl_is_clamped() {
        assert_eq!(ttl_secs(DurationSecs(0)), 1);
        assert_eq!(ttl_secs(DurationSecs(90)), 90);
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn round_trips_and_deletes() -> color_eyre::Result<()> {
        let store = store().await?;

        store.set("a", b"one", DurationSecs(30)).await?;
        assert_eq!(store.get("a").await?.as_deref(), Some(&b"one"[..]));

        store.delete(&["a", "missing"]).await?;
        assert_eq!(store.get("a").await?, None);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn rotate_is_single_use() -> color_eyre::Result<()> {
        let store = store().await?;
        store.set("old", b"one", DurationSecs(30)).await?;

        assert!(store.rotate("old", "new", b"two", DurationSecs(30)).await?);
        assert!(!store.rotate("old", "newer", b"three", DurationSecs(30)).await?);
        assert_eq!(store.get("new").await?.as_deref(), Some(&b"two"[..]));
        assert_eq!(store.get("newer").await?, None);

        store.delete(&["new"]).await?;
        Ok(())
    }
}
