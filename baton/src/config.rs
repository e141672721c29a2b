//! Token issuance settings

use baton_clock::DurationSecs;
use serde::{Deserialize, Serialize};

use crate::{
    codec::TokenCodec,
    jwa::{Algorithm, SigningKey},
};

/// How long issued tokens remain usable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLifetimes {
    /// Lifetime of an access token
    pub access: DurationSecs,
    /// Lifetime of a refresh session, renewed on every rotation
    pub refresh: DurationSecs,
}

impl Default for TokenLifetimes {
    /// Fifteen minute access tokens and day-long refresh sessions
    fn default() -> Self {
        Self {
            access: DurationSecs::from_mins(15),
            refresh: DurationSecs::from_hours(24),
        }
    }
}

/// Key material and policy for issuing tokens
///
/// Fixed once a service has been built from it.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    key: SigningKey,
    algorithm: Algorithm,
    lifetimes: TokenLifetimes,
    leeway: DurationSecs,
}

impl TokenConfig {
    /// Settings signing with `key` using HS256, default lifetimes, and no
    /// leeway
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            algorithm: Algorithm::default(),
            lifetimes: TokenLifetimes::default(),
            leeway: DurationSecs::default(),
        }
    }

    /// Signs and accepts only `algorithm`
    #[must_use]
    pub fn with_algorithm(self, algorithm: Algorithm) -> Self {
        Self { algorithm, ..self }
    }

    /// Issues tokens with the given lifetimes
    #[must_use]
    pub fn with_lifetimes(self, lifetimes: TokenLifetimes) -> Self {
        Self { lifetimes, ..self }
    }

    /// Tolerates access tokens up to `leeway` past their expiration
    #[must_use]
    pub fn with_leeway(self, leeway: DurationSecs) -> Self {
        Self { leeway, ..self }
    }

    /// The algorithm tokens are signed with
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The lifetimes of issued tokens
    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Builds the codec described by these settings
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(self.key.clone(), self.algorithm).with_leeway(self.leeway)
    }
}
