//! Extraction of verified claims from bearer tokens

use axum::extract::{FromRef, FromRequestParts};
use baton::{AccessClaims, AccessTokenRef};
use http::{header, request::Parts};

use crate::{error::AuthRejection, SharedTokenService};

/// The verified claims of the request's bearer token
///
/// Handlers that take this extractor only run once the
/// `Authorization: Bearer …` header has been verified; otherwise the request
/// is answered with `401 Unauthorized`.
#[derive(Clone, Debug)]
pub struct Authenticated(pub AccessClaims);

impl Authenticated {
    /// The verified claims
    pub fn claims(&self) -> &AccessClaims {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    SharedTokenService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer)
            .ok_or(AuthRejection::MissingToken)?;

        let service = SharedTokenService::from_ref(state);
        let claims = service.verify_access_token(token)?;

        Ok(Self(claims))
    }
}

fn extract_bearer(auth: &str) -> Option<&AccessTokenRef> {
    if auth.len() <= 7 || !auth.is_char_boundary(7) || !auth[..7].eq_ignore_ascii_case("bearer ")
    {
        return None;
    }

    let token = auth[7..].trim();
    if token.is_empty() {
        return None;
    }

    Some(AccessTokenRef::from_str(token))
}
