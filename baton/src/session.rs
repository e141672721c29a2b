//! Typed access to refresh sessions

use std::{fmt, sync::Arc};

use baton_clock::{DurationSecs, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{error::StoreError, store::SessionStore, PrincipalId, RefreshTokenRef, Role};

/// The record stored under a live refresh token
///
/// Records are never edited in place. Rotation writes a new record under a
/// new token and removes the old one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSession {
    /// The principal the session belongs to
    pub user_id: PrincipalId,
    /// The role the principal held when the session was created
    pub role: Role,
    /// When the session stops being usable
    pub expires_at: UnixTime,
}

impl RefreshSession {
    /// Whether the session can no longer be used at `now`
    ///
    /// A session is unusable from `expires_at` onwards, the same instant at
    /// which session stores drop the record.
    #[must_use]
    pub fn is_expired_at(&self, now: UnixTime) -> bool {
        now >= self.expires_at
    }
}

/// Maps raw session store operations onto [`RefreshSession`] records
///
/// Records are encoded as JSON.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SessionRepository { store }")
    }
}

impl SessionRepository {
    /// A repository over the given store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Looks up the session stored under `token`
    ///
    /// An absent record is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// The store failed, or the stored record could not be decoded.
    pub async fn load(
        &self,
        token: &RefreshTokenRef,
    ) -> Result<Option<RefreshSession>, StoreError> {
        let Some(raw) = self.store.get(token.as_str()).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(StoreError::new)
    }

    /// Writes `session` under `token`, to expire from the store after `ttl`
    ///
    /// # Errors
    ///
    /// The record could not be encoded or the store failed.
    pub async fn save(
        &self,
        token: &RefreshTokenRef,
        session: &RefreshSession,
        ttl: DurationSecs,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(session).map_err(StoreError::new)?;
        self.store.set(token.as_str(), &raw, ttl).await
    }

    /// Removes the session stored under `token`, if any
    ///
    /// # Errors
    ///
    /// The store failed.
    pub async fn invalidate(&self, token: &RefreshTokenRef) -> Result<(), StoreError> {
        self.store.delete(&[token.as_str()]).await
    }

    /// Consumes the session under `old` and stores `session` under `new`,
    /// provided `old` was still present
    ///
    /// Returns whether the swap happened.
    ///
    /// # Errors
    ///
    /// The record could not be encoded or the store failed.
    pub async fn rotate(
        &self,
        old: &RefreshTokenRef,
        new: &RefreshTokenRef,
        session: &RefreshSession,
        ttl: DurationSecs,
    ) -> Result<bool, StoreError> {
        let raw = serde_json::to_vec(session).map_err(StoreError::new)?;
        self.store
            .rotate(old.as_str(), new.as_str(), &raw, ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use baton_clock::TestClock;

    use super::*;
    use crate::{store::InMemorySessionStore, RefreshToken};

    fn session(expires_at: u64) -> RefreshSession {
        RefreshSession {
            user_id: PrincipalId::from("1"),
            role: Role::from("admin"),
            expires_at: UnixTime(expires_at),
        }
    }

    fn repository() -> (SessionRepository, Arc<InMemorySessionStore<TestClock>>) {
        let store = Arc::new(InMemorySessionStore::with_clock(TestClock::new(UnixTime(0))));
        (SessionRepository::new(store.clone()), store)
    }

    #[test]
    fn encodes_as_flat_json() -> color_eyre::Result<()> {
        let json = serde_json::to_value(session(86_400))?;
        assert_eq!(
            json,
            serde_json::json!({ "user_id": "1", "role": "admin", "expires_at": 86_400 })
        );
        Ok(())
    }

    #[test]
    fn expires_strictly_after_deadline() {
        let session = session(100);
        assert!(!session.is_expired_at(UnixTime(99)));
        assert!(session.is_expired_at(UnixTime(100)));
        assert!(session.is_expired_at(UnixTime(101)));
    }

    #[tokio::test]
    async fn load_save_invalidate() -> color_eyre::Result<()> {
        let (repo, _) = repository();
        let token = RefreshToken::from("token");

        assert_eq!(repo.load(&token).await?, None);

        repo.save(&token, &session(100), DurationSecs(100)).await?;
        assert_eq!(repo.load(&token).await?, Some(session(100)));

        repo.invalidate(&token).await?;
        repo.invalidate(&token).await?;
        assert_eq!(repo.load(&token).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_record_is_a_store_error() -> color_eyre::Result<()> {
        let (repo, store) = repository();
        store.set("garbage", b"not json", DurationSecs(10)).await?;

        assert!(repo.load(RefreshTokenRef::from_str("garbage")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn rotate_moves_the_session() -> color_eyre::Result<()> {
        let (repo, _) = repository();
        let old = RefreshToken::from("old");
        let new = RefreshToken::from("new");

        repo.save(&old, &session(100), DurationSecs(100)).await?;
        assert!(repo.rotate(&old, &new, &session(200), DurationSecs(200)).await?);
        assert_eq!(repo.load(&old).await?, None);
        assert_eq!(repo.load(&new).await?, Some(session(200)));

        assert!(!repo.rotate(&old, &new, &session(300), DurationSecs(300)).await?);
        Ok(())
    }
}
