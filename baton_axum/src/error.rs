//! Conversion of token failures into HTTP responses

use std::{error::Error as StdError, fmt};

use axum::response::{IntoResponse, Response};
use baton::{error::VerifyError, AuthError};
use http::{header, HeaderValue, StatusCode};

/// A failure of one of the token endpoints
///
/// Credential and refresh token problems become `401 Unauthorized`; every
/// other failure becomes a generic `500 Internal Server Error`, with the
/// detail only written to the log.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
            }
            AuthError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "invalid refresh token").into_response()
            }
            err => {
                tracing::error!(error = &err as &dyn StdError, "token endpoint failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

/// The request did not carry a usable bearer token
#[derive(Debug)]
#[non_exhaustive]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header was present
    MissingToken,

    /// The bearer token failed verification
    Rejected(VerifyError),
}

impl From<VerifyError> for AuthRejection {
    fn from(err: VerifyError) -> Self {
        Self::Rejected(err)
    }
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingToken => f.write_str("missing bearer token"),
            Self::Rejected(_) => f.write_str("invalid or expired token"),
        }
    }
}

impl StdError for AuthRejection {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::MissingToken => None,
            Self::Rejected(err) => Some(err),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let challenge = match &self {
            Self::MissingToken => HeaderValue::from_static("Bearer"),
            Self::Rejected(err) => {
                tracing::debug!(error = err as &dyn StdError, "bearer token rejected");
                if err.is_expired() {
                    HeaderValue::from_static(
                        r#"Bearer error="invalid_token" error_description="token expired""#,
                    )
                } else {
                    HeaderValue::from_static(r#"Bearer error="invalid_token""#)
                }
            }
        };

        let mut resp = (StatusCode::UNAUTHORIZED, self.to_string()).into_response();
        resp.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        resp
    }
}
