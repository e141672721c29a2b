//! Opaque refresh token generation

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use ring::rand::SecureRandom;

use crate::{error, RefreshToken};

/// Number of random bytes behind each refresh token
pub const DEFAULT_OPAQUE_TOKEN_LEN: usize = 32;

/// Generates a fresh token of `len` random bytes from the system source of
/// randomness
///
/// # Errors
///
/// The system random number generator failed.
pub fn generate_opaque_token(len: usize) -> Result<RefreshToken, error::RandomSourceError> {
    generate_opaque_token_with_rng(len, &ring::rand::SystemRandom::new())
}

/// Generates a fresh token using the provided source of randomness
///
/// The token is `len` random bytes, encoded as unpadded base64url. Refresh
/// tokens use [`DEFAULT_OPAQUE_TOKEN_LEN`].
///
/// # Errors
///
/// The provided random number generator failed.
pub fn generate_opaque_token_with_rng(
    len: usize,
    rng: &dyn SecureRandom,
) -> Result<RefreshToken, error::RandomSourceError> {
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| error::random_source_error())?;

    Ok(RefreshToken::new(BASE64_URL_SAFE_NO_PAD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tokens_are_unique_and_decode_to_32_bytes() -> color_eyre::Result<()> {
        let rng = ring::rand::SystemRandom::new();
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let token = generate_opaque_token_with_rng(DEFAULT_OPAQUE_TOKEN_LEN, &rng)?;
            let raw = BASE64_URL_SAFE_NO_PAD.decode(token.as_str())?;
            assert_eq!(raw.len(), DEFAULT_OPAQUE_TOKEN_LEN);
            assert!(seen.insert(token), "duplicate refresh token generated");
        }

        Ok(())
    }

    #[test]
    fn token_length_follows_requested_byte_count() -> color_eyre::Result<()> {
        for len in [1, 16, 48, 64] {
            let token = generate_opaque_token(len)?;
            let raw = BASE64_URL_SAFE_NO_PAD.decode(token.as_str())?;
            assert_eq!(raw.len(), len);
            assert!(!token.as_str().contains(['=', '+', '/']));
        }

        Ok(())
    }

    #[test]
    fn zero_bytes_is_an_empty_token() -> color_eyre::Result<()> {
        assert_eq!(generate_opaque_token(0)?.as_str(), "");
        Ok(())
    }
}
