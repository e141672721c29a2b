//! HMAC signing algorithms and keys

use std::{fmt, str::FromStr};

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};

use crate::error;

/// HMAC signing algorithms
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum Algorithm {
    /// HMAC using SHA-256
    #[default]
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl Algorithm {
    /// The name of the algorithm as it appears in a token header
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    /// Recommended key size in bytes for an HMAC secret
    #[must_use]
    pub const fn recommended_key_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    /// The size in bytes of an HMAC signature
    #[must_use]
    pub const fn signature_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    pub(crate) fn into_ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            Self::HS256 => ring::hmac::HMAC_SHA256,
            Self::HS384 => ring::hmac::HMAC_SHA384,
            Self::HS512 => ring::hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            _ => Err(error::unknown_algorithm(s.to_owned())),
        }
    }
}

/// A shared HMAC secret used to sign and verify access tokens
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct SigningKey {
    secret: Vec<u8>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SigningKey { secret }")
    }
}

impl SigningKey {
    /// HMAC key using the provided secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// HMAC key from a base64url-encoded secret, with or without padding
    ///
    /// # Errors
    ///
    /// The secret is not valid base64url.
    pub fn from_base64url(encoded: &str) -> Result<Self, base64::DecodeError> {
        let secret = BASE64_URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
        Ok(Self { secret })
    }

    /// Generates a new secret sized for the given algorithm
    ///
    /// # Errors
    ///
    /// Unable to generate a new HMAC secret.
    pub fn generate(alg: Algorithm) -> Result<Self, error::RandomSourceError> {
        Self::generate_with_rng(alg, &ring::rand::SystemRandom::new())
    }

    /// Generates a new secret using the provided source of randomness
    ///
    /// # Errors
    ///
    /// Unable to generate a new HMAC secret from the provided RNG.
    pub fn generate_with_rng(
        alg: Algorithm,
        rng: &dyn SecureRandom,
    ) -> Result<Self, error::RandomSourceError> {
        let mut secret = vec![0; alg.recommended_key_size()];

        rng.fill(&mut secret)
            .map_err(|_| error::random_source_error())?;

        Ok(Self { secret })
    }

    /// Whether the secret is empty, and thus unusable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    pub(crate) fn sign(&self, alg: Algorithm, data: &[u8]) -> Vec<u8> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        ring::hmac::sign(&key, data).as_ref().to_owned()
    }

    pub(crate) fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> bool {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        ring::hmac::verify(&key, data, signature).is_ok()
    }
}
