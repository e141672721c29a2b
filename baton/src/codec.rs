//! Signing and verification of access tokens
//!
//! Access tokens are compact JWS values,
//! `base64url(header).base64url(claims).base64url(mac)`, authenticated with
//! a single HMAC algorithm. A token naming any other algorithm is rejected
//! before its MAC is examined.

use baton_clock::{Clock, DurationSecs, System, UnixTime};
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use ring::rand::SystemRandom;
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, InvalidToken, IssueError, SigningError, VerifyError},
    jwa::{Algorithm, SigningKey},
    opaque, AccessClaims, AccessToken, AccessTokenRef, Principal, RefreshToken, RefreshTokenRef,
};

macro_rules! expect_two {
    ($iter:expr) => {{
        let mut i = $iter;
        match (i.next(), i.next(), i.next()) {
            (Some(first), Some(second), None) => Some((first, second)),
            _ => None,
        }
    }};
}

#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// A freshly minted access token and refresh token
#[derive(Debug, Clone)]
#[must_use]
pub struct TokenPair {
    access_token: AccessToken,
    refresh_token: RefreshToken,
    access_expires_at: UnixTime,
    refresh_expires_at: UnixTime,
}

impl TokenPair {
    /// The signed access token
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// The opaque refresh token
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// When the access token expires
    pub fn access_expires_at(&self) -> UnixTime {
        self.access_expires_at
    }

    /// When the refresh session backing the refresh token expires
    pub fn refresh_expires_at(&self) -> UnixTime {
        self.refresh_expires_at
    }

    /// Splits the pair into its two tokens
    pub fn into_tokens(self) -> (AccessToken, RefreshToken) {
        (self.access_token, self.refresh_token)
    }
}

/// Signs and verifies access tokens with a symmetric key
///
/// The codec holds no mutable state; it may be shared freely between tasks.
#[derive(Debug)]
pub struct TokenCodec<C = System> {
    key: SigningKey,
    alg: Algorithm,
    leeway: DurationSecs,
    rng: SystemRandom,
    clock: C,
}

impl TokenCodec {
    /// Constructs a codec that signs with `key` and accepts only `alg`
    pub fn new(key: SigningKey, alg: Algorithm) -> Self {
        Self {
            key,
            alg,
            leeway: DurationSecs::default(),
            rng: SystemRandom::new(),
            clock: System,
        }
    }
}

impl<C> TokenCodec<C> {
    /// Tolerates tokens up to `leeway` past their expiration
    pub fn with_leeway(self, leeway: DurationSecs) -> Self {
        Self { leeway, ..self }
    }

    /// Replaces the clock used to stamp and check tokens
    pub fn with_clock<D>(self, clock: D) -> TokenCodec<D> {
        TokenCodec {
            key: self.key,
            alg: self.alg,
            leeway: self.leeway,
            rng: self.rng,
            clock,
        }
    }

    /// The clock used to stamp and check tokens
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The single algorithm this codec signs with and accepts
    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }

    /// Signs an already constructed set of claims
    ///
    /// # Errors
    ///
    /// The key is empty or the claims cannot be serialized.
    pub fn sign_claims(&self, claims: &AccessClaims) -> Result<AccessToken, SigningError> {
        if self.key.is_empty() {
            return Err(error::signing_error("signing key is empty"));
        }

        let header = serde_json::to_vec(&Header {
            alg: self.alg.as_str(),
            typ: "JWT",
        })
        .map_err(error::signing_error)?;
        let payload = serde_json::to_vec(claims).map_err(error::signing_error)?;

        let mut token = BASE64_URL_SAFE_NO_PAD.encode(header);
        token.push('.');
        BASE64_URL_SAFE_NO_PAD.encode_string(payload, &mut token);

        let signature = self.key.sign(self.alg, token.as_bytes());
        token.push('.');
        BASE64_URL_SAFE_NO_PAD.encode_string(signature, &mut token);

        Ok(AccessToken::new(token))
    }

    /// Generates a fresh, unpredictable token of `len` random bytes
    ///
    /// # Errors
    ///
    /// The system random number generator failed.
    pub fn generate_opaque_token(
        &self,
        len: usize,
    ) -> Result<RefreshToken, error::RandomSourceError> {
        opaque::generate_opaque_token_with_rng(len, &self.rng)
    }
}

impl<C: Clock> TokenCodec<C> {
    /// Signs an access token for `principal`, valid for `ttl` from now
    ///
    /// # Errors
    ///
    /// The key is empty or the claims cannot be serialized.
    pub fn sign(
        &self,
        principal: &Principal,
        ttl: DurationSecs,
    ) -> Result<AccessToken, SigningError> {
        let now = self.clock.now();
        self.sign_claims(&AccessClaims::new(principal, now, now + ttl))
    }

    /// Mints an access token and a refresh token for `principal`
    ///
    /// # Errors
    ///
    /// Either the access token could not be signed or the refresh token
    /// could not be generated.
    pub fn issue_pair(
        &self,
        principal: &Principal,
        access_ttl: DurationSecs,
        refresh_ttl: DurationSecs,
    ) -> Result<TokenPair, IssueError> {
        let now = self.clock.now();
        let access_expires_at = now + access_ttl;
        let access_token =
            self.sign_claims(&AccessClaims::new(principal, now, access_expires_at))?;
        let refresh_token = self.generate_opaque_token(opaque::DEFAULT_OPAQUE_TOKEN_LEN)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at: now + refresh_ttl,
        })
    }

    /// Verifies an access token and extracts its claims
    ///
    /// # Errors
    ///
    /// [`VerifyError::InvalidToken`] when the token is malformed, names an
    /// algorithm other than the configured one, or fails the MAC check;
    /// [`VerifyError::ExpiredToken`] when it is authentic but expired.
    pub fn verify(&self, token: &AccessTokenRef) -> Result<AccessClaims, VerifyError> {
        if self.key.is_empty() {
            return Err(InvalidToken::SignatureMismatch.into());
        }

        let (s_str, message) =
            expect_two!(token.as_str().rsplitn(2, '.')).ok_or(InvalidToken::Malformed)?;
        let (p_str, h_str) =
            expect_two!(message.rsplitn(2, '.')).ok_or(InvalidToken::Malformed)?;

        let h_raw = BASE64_URL_SAFE_NO_PAD
            .decode(h_str)
            .map_err(|e| InvalidToken::MalformedHeader(e.into()))?;
        let header: RawHeader =
            serde_json::from_slice(&h_raw).map_err(|e| InvalidToken::MalformedHeader(e.into()))?;

        match header.alg.parse::<Algorithm>() {
            Ok(alg) if alg == self.alg => {}
            _ => {
                tracing::debug!(alg = %header.alg, "rejecting token with unapproved algorithm");
                return Err(InvalidToken::UnapprovedAlgorithm.into());
            }
        }

        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(s_str)
            .map_err(|e| InvalidToken::MalformedSignature(e.into()))?;

        if !self.key.verify(self.alg, message.as_bytes(), &signature) {
            return Err(InvalidToken::SignatureMismatch.into());
        }

        let p_raw = BASE64_URL_SAFE_NO_PAD
            .decode(p_str)
            .map_err(|e| InvalidToken::MalformedClaims(e.into()))?;
        let claims: AccessClaims =
            serde_json::from_slice(&p_raw).map_err(|e| InvalidToken::MalformedClaims(e.into()))?;

        let now = self.clock.now();
        if now >= claims.expires_at() + self.leeway {
            tracing::trace!(exp = %claims.expires_at(), %now, "access token expired");
            return Err(VerifyError::ExpiredToken);
        }

        Ok(claims)
    }
}
