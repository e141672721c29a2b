//! Signed access tokens with single-use, rotating refresh sessions
//!
//! `baton` issues a pair of credentials when a principal signs in: a
//! short-lived access token, a compact JWS authenticated with an HMAC key,
//! and a longer-lived opaque refresh token backed by a record in a session
//! store. Presenting the refresh token exchanges it for a new pair. Each
//! refresh token can be exchanged at most once, even when the same token is
//! presented by several requests at the same moment.
//!
//! The moving parts are:
//!
//! * [`TokenCodec`][codec::TokenCodec], which signs and verifies access
//!   tokens and generates refresh tokens;
//! * [`SessionStore`][store::SessionStore], the key/value capability where
//!   refresh sessions live, with an in-memory implementation and, behind the
//!   `redis` feature, a Redis one;
//! * [`PrincipalResolver`][resolver::PrincipalResolver], which turns an email
//!   and password into a [`Principal`];
//! * [`TokenService`], which ties these together.
//!
//! ```
//! use std::sync::Arc;
//!
//! use baton::{
//!     jwa::SigningKey, store::InMemorySessionStore, EmailRef, PasswordRef, Principal,
//!     StaticPrincipalResolver, TokenConfig, TokenService,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let resolver = StaticPrincipalResolver::new().with_account(
//!     "a@example.com",
//!     "pw",
//!     Principal::new("1", "admin"),
//! );
//!
//! let service = TokenService::new(
//!     &TokenConfig::new(SigningKey::new(b"an example key".to_vec())),
//!     Arc::new(InMemorySessionStore::new()),
//!     Arc::new(resolver),
//! );
//!
//! let pair = service
//!     .sign_in(EmailRef::from_str("a@example.com"), PasswordRef::from_str("pw"))
//!     .await?;
//! let claims = service.verify_access_token(pair.access_token())?;
//! assert_eq!(claims.role().as_str(), "admin");
//!
//! let next = service.refresh(pair.refresh_token()).await?;
//! assert!(service.refresh(pair.refresh_token()).await.is_err());
//! # let _ = next;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `redis`: Provides [`RedisSessionStore`][store::RedisSessionStore], which
//!   keeps refresh sessions in Redis and rotates them with a server-side
//!   script.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod claims;
pub mod codec;
mod config;
pub mod error;
pub mod jwa;
pub mod opaque;
pub mod resolver;
mod service;
pub mod session;
pub mod store;

pub use braids::*;
pub use claims::{AccessClaims, Principal};
pub use codec::TokenPair;
pub use config::{TokenConfig, TokenLifetimes};
pub use error::AuthError;
pub use resolver::StaticPrincipalResolver;
pub use service::TokenService;
