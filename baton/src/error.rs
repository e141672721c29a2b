//! Common errors

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

/// A boxed, thread-safe error source
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn unknown_algorithm(alg: String) -> UnknownAlgorithm {
    UnknownAlgorithm { alg }
}

/// The access token could not be signed
#[derive(Debug, Error)]
#[error("unable to sign access token")]
pub struct SigningError {
    #[source]
    source: BoxError,
}

pub(crate) fn signing_error(source: impl Into<BoxError>) -> SigningError {
    SigningError {
        source: source.into(),
    }
}

/// The system source of randomness failed to produce bytes
#[derive(Debug, Error)]
#[error("random number generator failure")]
pub struct RandomSourceError {
    _p: (),
}

pub(crate) const fn random_source_error() -> RandomSourceError {
    RandomSourceError { _p: () }
}

/// The session store could not complete an operation
///
/// Covers transport failures as well as records that cannot be
/// (de)serialized.
#[derive(Debug, Error)]
#[error("session store failure")]
pub struct StoreError {
    #[source]
    source: BoxError,
}

impl StoreError {
    /// Wraps a backend-specific failure
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// An error occurring while minting a token pair
#[derive(Debug, Error)]
pub enum IssueError {
    /// The access token could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The refresh token could not be generated
    #[error(transparent)]
    RandomSource(#[from] RandomSourceError),
}

/// The reason an access token was judged invalid
#[derive(Debug, Error)]
pub enum InvalidToken {
    /// The token does not have a header, payload, and signature section
    #[error("malformed token")]
    Malformed,

    /// The token header could not be decoded
    #[error("malformed token header")]
    MalformedHeader(#[source] BoxError),

    /// The token claims could not be decoded
    #[error("malformed token claims")]
    MalformedClaims(#[source] BoxError),

    /// The token signature could not be decoded
    #[error("malformed token signature")]
    MalformedSignature(#[source] BoxError),

    /// The token names an algorithm other than the one approved
    #[error("algorithm not approved")]
    UnapprovedAlgorithm,

    /// The token was not signed by the configured key
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// An error occurring while verifying an access token
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is malformed, mis-signed, or uses an unapproved algorithm
    #[error("invalid access token")]
    InvalidToken(#[from] InvalidToken),

    /// The token is authentic, but its `exp` claim has passed
    #[error("access token expired")]
    ExpiredToken,
}

impl VerifyError {
    /// Whether the token was well formed and authentic but expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ExpiredToken)
    }

    /// Whether the token was rejected as inauthentic or unreadable
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidToken(_))
    }
}

/// An error reported by a principal resolver
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The email is unknown or the password does not match
    #[error("credentials rejected")]
    Rejected,

    /// The resolver could not reach its backing user store
    #[error("principal resolver unavailable")]
    Unavailable(#[source] BoxError),
}

/// An error surfaced by the token service
///
/// Credential and refresh-token problems are collapsed into
/// [`InvalidCredentials`][Self::InvalidCredentials] and
/// [`InvalidRefreshToken`][Self::InvalidRefreshToken] so that callers
/// cannot tell which part of an attempt failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email/password pair was not accepted
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token is unknown, already used, or expired
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// An access token could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A refresh token could not be generated
    #[error(transparent)]
    RandomSource(#[from] RandomSourceError),

    /// The session store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The principal resolver failed for reasons other than bad credentials
    #[error("principal resolver unavailable")]
    ResolverUnavailable(#[source] BoxError),
}

impl AuthError {
    /// Whether the caller should be told it is not authenticated, as opposed
    /// to receiving a generic server error
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::InvalidRefreshToken)
    }
}

impl From<IssueError> for AuthError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Signing(err) => Self::Signing(err),
            IssueError::RandomSource(err) => Self::RandomSource(err),
        }
    }
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Rejected => Self::InvalidCredentials,
            ResolveError::Unavailable(source) => Self::ResolverUnavailable(source),
        }
    }
}
