//! Issuance and rotation of token pairs

use std::{error::Error as StdError, fmt, sync::Arc};

use baton_clock::{Clock, System};

use crate::{
    codec::{TokenCodec, TokenPair},
    config::{TokenConfig, TokenLifetimes},
    error::{AuthError, VerifyError},
    resolver::PrincipalResolver,
    session::{RefreshSession, SessionRepository},
    store::SessionStore,
    AccessClaims, AccessTokenRef, EmailRef, PasswordRef, Principal, RefreshTokenRef,
};

/// Signs principals in, and exchanges refresh tokens for new token pairs
///
/// Every refresh token is single use. Exchanging one consumes it and stores
/// its successor in a single atomic store operation, so two concurrent
/// exchanges of the same token cannot both succeed, and a successful
/// exchange never leaves the caller without a usable token.
///
/// The service holds no mutable state of its own and can be shared behind an
/// [`Arc`] by any number of request handlers.
pub struct TokenService<C = System> {
    codec: TokenCodec<C>,
    sessions: SessionRepository,
    resolver: Arc<dyn PrincipalResolver>,
    lifetimes: TokenLifetimes,
}

impl<C: fmt::Debug> fmt::Debug for TokenService<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("codec", &self.codec)
            .field("sessions", &self.sessions)
            .field("lifetimes", &self.lifetimes)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Builds a service from its settings and collaborators
    pub fn new(
        config: &TokenConfig,
        store: Arc<dyn SessionStore>,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            codec: config.codec(),
            sessions: SessionRepository::new(store),
            resolver,
            lifetimes: config.lifetimes(),
        }
    }
}

impl<C> TokenService<C> {
    /// Replaces the clock used to stamp tokens and judge session expiry
    pub fn with_clock<D>(self, clock: D) -> TokenService<D> {
        TokenService {
            codec: self.codec.with_clock(clock),
            sessions: self.sessions,
            resolver: self.resolver,
            lifetimes: self.lifetimes,
        }
    }

    /// The lifetimes given to issued tokens
    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }
}

impl<C: Clock> TokenService<C> {
    /// Verifies credentials and issues a token pair backed by a new refresh
    /// session
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] when the resolver rejects the
    /// credentials, without saying whether the email or the password was
    /// wrong. Other variants report internal failures.
    pub async fn sign_in(
        &self,
        email: &EmailRef,
        password: &PasswordRef,
    ) -> Result<TokenPair, AuthError> {
        let principal = self.resolver.resolve(email, password).await.map_err(|err| {
            tracing::debug!(error = &err as &dyn StdError, "sign-in rejected");
            AuthError::from(err)
        })?;

        let pair = self.issue(&principal)?;
        let session = RefreshSession {
            user_id: principal.id,
            role: principal.role,
            expires_at: pair.refresh_expires_at(),
        };

        self.sessions
            .save(pair.refresh_token(), &session, self.lifetimes.refresh)
            .await?;

        tracing::debug!(user_id = %session.user_id, role = %session.role, "signed in");
        Ok(pair)
    }

    /// Exchanges a refresh token for a new token pair, consuming it
    ///
    /// The new refresh session is granted a full refresh lifetime.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidRefreshToken`] when the token was never issued,
    /// has already been exchanged or revoked, or has expired. Other variants
    /// report internal failures.
    pub async fn refresh(&self, token: &RefreshTokenRef) -> Result<TokenPair, AuthError> {
        let Some(current) = self.sessions.load(token).await? else {
            tracing::debug!("refresh token not found");
            return Err(AuthError::InvalidRefreshToken);
        };

        let now = self.codec.clock().now();
        if current.is_expired_at(now) {
            tracing::debug!(user_id = %current.user_id, "refresh session expired");
            if let Err(err) = self.sessions.invalidate(token).await {
                tracing::warn!(
                    error = &err as &dyn StdError,
                    "unable to remove expired refresh session"
                );
            }
            return Err(AuthError::InvalidRefreshToken);
        }

        let principal = Principal {
            id: current.user_id,
            role: current.role,
        };
        let pair = self.issue(&principal)?;
        let next = RefreshSession {
            user_id: principal.id,
            role: principal.role,
            expires_at: pair.refresh_expires_at(),
        };

        let rotated = self
            .sessions
            .rotate(token, pair.refresh_token(), &next, self.lifetimes.refresh)
            .await?;

        if !rotated {
            tracing::debug!(
                user_id = %next.user_id,
                "refresh token consumed by a concurrent exchange"
            );
            return Err(AuthError::InvalidRefreshToken);
        }

        tracing::debug!(user_id = %next.user_id, role = %next.role, "refresh token rotated");
        Ok(pair)
    }

    /// Verifies an access token and returns its claims
    ///
    /// # Errors
    ///
    /// The token is malformed, was not signed by this service, or has
    /// expired.
    pub fn verify_access_token(
        &self,
        token: &AccessTokenRef,
    ) -> Result<AccessClaims, VerifyError> {
        self.codec.verify(token)
    }

    /// Revokes a refresh token
    ///
    /// Revoking a token that is unknown or already consumed succeeds.
    ///
    /// # Errors
    ///
    /// The session store failed.
    pub async fn sign_out(&self, token: &RefreshTokenRef) -> Result<(), AuthError> {
        self.sessions.invalidate(token).await?;
        tracing::debug!("refresh session revoked");
        Ok(())
    }

    fn issue(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let pair = self
            .codec
            .issue_pair(principal, self.lifetimes.access, self.lifetimes.refresh)?;
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use baton_clock::{DurationSecs, TestClock, UnixTime};
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        error::{BoxError, ResolveError, StoreError},
        jwa::SigningKey,
        store::InMemorySessionStore,
        StaticPrincipalResolver,
    };

    const START: UnixTime = UnixTime(1_700_000_000);

    fn config() -> TokenConfig {
        TokenConfig::new(SigningKey::new(b"test signing key".to_vec()))
    }

    fn resolver() -> Arc<dyn PrincipalResolver> {
        Arc::new(StaticPrincipalResolver::new().with_account(
            "a@example.com",
            "pw",
            Principal::new("1", "admin"),
        ))
    }

    fn service() -> (TokenService<TestClock>, TestClock) {
        let clock = TestClock::new(START);
        let store = Arc::new(InMemorySessionStore::with_clock(clock.clone()));
        let service = TokenService::new(&config(), store, resolver()).with_clock(clock.clone());
        (service, clock)
    }

    async fn sign_in<C: Clock>(service: &TokenService<C>) -> Result<TokenPair, AuthError> {
        service
            .sign_in(
                EmailRef::from_str("a@example.com"),
                PasswordRef::from_str("pw"),
            )
            .await
    }

    #[tokio::test]
    async fn sign_in_then_refresh_rotates_the_token() -> color_eyre::Result<()> {
        let (service, _) = service();

        let first = sign_in(&service).await?;
        let second = service.refresh(first.refresh_token()).await?;
        assert_ne!(first.refresh_token(), second.refresh_token());

        let reused = service.refresh(first.refresh_token()).await;
        assert!(matches!(reused, Err(AuthError::InvalidRefreshToken)));

        let _third = service.refresh(second.refresh_token()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_rejected() {
        let (service, _) = service();
        let result = service
            .refresh(RefreshTokenRef::from_str("never-issued"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn invalid_credentials_are_indistinguishable() {
        let (service, _) = service();

        let wrong_password = service
            .sign_in(
                EmailRef::from_str("a@example.com"),
                PasswordRef::from_str("wrong"),
            )
            .await;
        let unknown_email = service
            .sign_in(
                EmailRef::from_str("nobody@example.com"),
                PasswordRef::from_str("pw"),
            )
            .await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn end_to_end_with_default_lifetimes() -> color_eyre::Result<()> {
        let (service, clock) = service();
        assert_eq!(service.lifetimes(), TokenLifetimes::default());

        let pair = sign_in(&service).await?;
        let claims = service.verify_access_token(pair.access_token())?;
        assert_eq!(claims.subject().as_str(), "1");
        assert_eq!(claims.role().as_str(), "admin");
        assert_eq!(claims.expires_at(), START + DurationSecs::from_mins(15));

        clock.advance(DurationSecs::from_hours(23));
        let next = service.refresh(pair.refresh_token()).await?;
        let claims = service.verify_access_token(next.access_token())?;
        assert_eq!(claims.subject().as_str(), "1");
        assert_eq!(claims.role().as_str(), "admin");

        assert!(service
            .verify_access_token(pair.access_token())
            .unwrap_err()
            .is_expired());

        clock.advance(DurationSecs::from_hours(24) + DurationSecs(1));
        let expired = service.refresh(next.refresh_token()).await;
        assert!(matches!(expired, Err(AuthError::InvalidRefreshToken)));
        Ok(())
    }

    #[tokio::test]
    async fn rotation_grants_a_fresh_refresh_lifetime() -> color_eyre::Result<()> {
        let (service, clock) = service();
        let mut pair = sign_in(&service).await?;

        for _ in 0..3 {
            clock.advance(DurationSecs::from_hours(20));
            pair = service.refresh(pair.refresh_token()).await?;
            assert_eq!(
                pair.refresh_expires_at(),
                clock.now() + DurationSecs::from_hours(24)
            );
        }

        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn expired_session_is_removed() -> color_eyre::Result<()> {
        let clock = TestClock::new(START);
        let store = Arc::new(InMemorySessionStore::new());
        let service =
            TokenService::new(&config(), store.clone(), resolver()).with_clock(clock.clone());

        let pair = sign_in(&service).await?;
        assert_eq!(store.len(), 1);

        clock.advance(DurationSecs::from_hours(24) + DurationSecs(1));
        let result = service.refresh(pair.refresh_token()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
        assert!(store.is_empty());
        assert!(logs_contain("refresh session expired"));
        Ok(())
    }

    #[tokio::test]
    async fn session_is_unusable_from_its_expiry_instant() -> color_eyre::Result<()> {
        let clock = TestClock::new(START);
        let store = Arc::new(InMemorySessionStore::new());
        let service =
            TokenService::new(&config(), store.clone(), resolver()).with_clock(clock.clone());

        let pair = sign_in(&service).await?;
        clock.advance(DurationSecs::from_hours(24));

        let result = service.refresh(pair.refresh_token()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn store_and_session_agree_on_expiry() -> color_eyre::Result<()> {
        let clock = TestClock::new(START);
        let store = Arc::new(InMemorySessionStore::with_clock(clock.clone()));
        let service =
            TokenService::new(&config(), store.clone(), resolver()).with_clock(clock.clone());

        let pair = sign_in(&service).await?;
        clock.advance(DurationSecs(24 * 60 * 60 - 1));
        let next = service.refresh(pair.refresh_token()).await?;

        clock.advance(DurationSecs::from_hours(24));
        let result = service.refresh(next.refresh_token()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_have_one_winner() -> color_eyre::Result<()> {
        let store = Arc::new(InMemorySessionStore::new());
        let service = Arc::new(TokenService::new(&config(), store, resolver()));

        for round in 0..50 {
            let pair = sign_in(&service).await?;
            let token = pair.refresh_token().to_owned();

            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let service = Arc::clone(&service);
                    let token = token.clone();
                    tokio::spawn(async move { service.refresh(&token).await })
                })
                .collect();

            let mut winners = 0;
            for task in tasks {
                match task.await? {
                    Ok(_) => winners += 1,
                    Err(AuthError::InvalidRefreshToken) => {}
                    Err(err) => return Err(err.into()),
                }
            }

            assert_eq!(winners, 1, "round {round}");
        }

        Ok(())
    }

    #[tokio::test]
    async fn sign_out_is_idempotent() -> color_eyre::Result<()> {
        let (service, _) = service();
        let pair = sign_in(&service).await?;

        service.sign_out(pair.refresh_token()).await?;
        service.sign_out(pair.refresh_token()).await?;

        let result = service.refresh(pair.refresh_token()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
        Ok(())
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::new("connection refused"))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: DurationSecs,
        ) -> Result<(), StoreError> {
            Err(StoreError::new("connection refused"))
        }

        async fn delete(&self, _keys: &[&str]) -> Result<(), StoreError> {
            Err(StoreError::new("connection refused"))
        }

        async fn rotate(
            &self,
            _old_key: &str,
            _new_key: &str,
            _value: &[u8],
            _ttl: DurationSecs,
        ) -> Result<bool, StoreError> {
            Err(StoreError::new("connection refused"))
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn store_failures_are_internal_errors() {
        let service = TokenService::new(&config(), Arc::new(BrokenStore), resolver());

        let signed_in = sign_in(&service).await.unwrap_err();
        assert!(matches!(signed_in, AuthError::Store(_)));
        assert!(!signed_in.is_unauthenticated());

        let refreshed = service
            .refresh(RefreshTokenRef::from_str("anything"))
            .await
            .unwrap_err();
        assert!(matches!(refreshed, AuthError::Store(_)));
    }

    struct UnreachableDirectory;

    #[async_trait]
    impl PrincipalResolver for UnreachableDirectory {
        async fn resolve(
            &self,
            _email: &EmailRef,
            _password: &PasswordRef,
        ) -> Result<Principal, ResolveError> {
            Err(ResolveError::Unavailable(BoxError::from("directory timed out")))
        }
    }

    #[tokio::test]
    async fn resolver_outage_is_not_reported_as_bad_credentials() {
        let store = Arc::new(InMemorySessionStore::new());
        let service = TokenService::new(&config(), store, Arc::new(UnreachableDirectory));

        let err = sign_in(&service).await.unwrap_err();
        assert!(matches!(err, AuthError::ResolverUnavailable(_)));
        assert!(!err.is_unauthenticated());
    }

    #[tokio::test]
    async fn empty_key_fails_to_sign() {
        let store = Arc::new(InMemorySessionStore::new());
        let config = TokenConfig::new(SigningKey::new(Vec::new()));
        let service = TokenService::new(&config, store.clone(), resolver());

        let err = sign_in(&service).await.unwrap_err();
        assert!(matches!(err, AuthError::Signing(_)));
        assert!(store.is_empty());
    }
}
