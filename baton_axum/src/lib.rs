//! Axum endpoints for signing in with `baton` and rotating refresh tokens
//!
//! The [`router`] exposes four routes:
//!
//! * `POST /sign-in` accepts `{"email", "password"}` and responds with an
//!   access token, setting the refresh token as an `HttpOnly` cookie;
//! * `POST /refresh` exchanges the refresh token cookie for a new pair;
//! * `POST /sign-out` revokes the refresh token and clears the cookie;
//! * `GET /` returns the profile of the bearer of a valid access token.
//!
//! Other routes can require a valid access token by taking the
//! [`Authenticated`] extractor, which hands the verified claims to the
//! handler directly.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use baton::{
//!     jwa::SigningKey, store::InMemorySessionStore, Principal, StaticPrincipalResolver,
//!     TokenConfig, TokenService,
//! };
//! use baton_axum::{AuthState, Authenticated, RefreshCookie};
//! use axum::routing::get;
//!
//! async fn whoami(Authenticated(claims): Authenticated) -> String {
//!     format!("you are {}", claims.subject())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = StaticPrincipalResolver::new().with_account(
//!         "a@example.com",
//!         "pw",
//!         Principal::new("1", "admin"),
//!     );
//!     let service = TokenService::new(
//!         &TokenConfig::new(SigningKey::generate(Default::default())?),
//!         Arc::new(InMemorySessionStore::new()),
//!         Arc::new(resolver),
//!     );
//!
//!     let state = AuthState::new(Arc::new(service), RefreshCookie::default());
//!     let app = baton_axum::routes()
//!         .route("/whoami", get(whoami))
//!         .with_state(state);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

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

use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use baton::{
    AccessToken, AuthError, Email, Password, PrincipalId, RefreshToken, RefreshTokenRef, Role,
    TokenPair, TokenService,
};
use baton_clock::DurationSecs;
use serde::{Deserialize, Serialize};

pub mod error;
mod extract;

pub use error::{ApiError, AuthRejection};
pub use extract::Authenticated;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// A token service shared between request handlers
pub type SharedTokenService = Arc<TokenService>;

/// Attributes of the refresh token cookie
///
/// The cookie is always `HttpOnly`, `SameSite=Strict`, and scoped to `/`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshCookie {
    secure: bool,
}

impl Default for RefreshCookie {
    /// A cookie only sent over HTTPS
    fn default() -> Self {
        Self { secure: true }
    }
}

impl RefreshCookie {
    /// Allows the cookie to be sent over plain HTTP, for local development
    #[must_use]
    pub fn insecure(self) -> Self {
        Self { secure: false }
    }

    fn issue(self, token: &RefreshTokenRef, max_age: DurationSecs) -> Cookie<'static> {
        let max_age = i64::try_from(max_age.0).unwrap_or(i64::MAX);

        Cookie::build((REFRESH_COOKIE_NAME, token.as_str().to_owned()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(max_age))
            .build()
    }

    fn removal(self) -> Cookie<'static> {
        Cookie::build(REFRESH_COOKIE_NAME)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .build()
    }
}

/// State required by the token endpoints
#[derive(Clone, Debug)]
pub struct AuthState {
    service: SharedTokenService,
    cookie: RefreshCookie,
}

impl AuthState {
    /// Endpoint state around a shared token service
    pub fn new(service: SharedTokenService, cookie: RefreshCookie) -> Self {
        Self { service, cookie }
    }
}

impl FromRef<AuthState> for SharedTokenService {
    fn from_ref(state: &AuthState) -> Self {
        Arc::clone(&state.service)
    }
}

/// The token endpoints, awaiting their state
pub fn routes() -> Router<AuthState> {
    Router::new()
        .route("/sign-in", post(sign_in))
        .route("/refresh", post(refresh))
        .route("/sign-out", post(sign_out))
        .route("/", get(profile))
}

/// The token endpoints, ready to serve
pub fn router(state: AuthState) -> Router {
    routes().with_state(state)
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: Email,
    password: Password,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: AccessToken,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    id: PrincipalId,
    role: Role,
}

fn respond(
    state: &AuthState,
    jar: CookieJar,
    pair: TokenPair,
) -> (CookieJar, Json<TokenResponse>) {
    let lifetimes = state.service.lifetimes();
    let jar = jar.add(state.cookie.issue(pair.refresh_token(), lifetimes.refresh));
    let (access_token, _) = pair.into_tokens();

    let body = TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: lifetimes.access.0,
    };

    (jar, Json(body))
}

async fn sign_in(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let pair = state.service.sign_in(&req.email, &req.password).await?;
    Ok(respond(&state, jar, pair))
}

async fn refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| RefreshToken::from(cookie.value()))
        .ok_or(AuthError::InvalidRefreshToken)?;

    let pair = state.service.refresh(&token).await?;
    Ok(respond(&state, jar, pair))
}

async fn sign_out(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), ApiError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        state
            .service
            .sign_out(RefreshTokenRef::from_str(cookie.value()))
            .await?;
    }

    Ok((StatusCode::NO_CONTENT, jar.remove(state.cookie.removal())))
}

async fn profile(Authenticated(claims): Authenticated) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: claims.subject().to_owned(),
        role: claims.role().to_owned(),
    })
}
