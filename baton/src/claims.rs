//! Principals and the claims carried by access tokens

use baton_clock::UnixTime;
use serde::{Deserialize, Serialize};

use crate::{PrincipalId, PrincipalIdRef, Role, RoleRef};

/// An authenticated identity and the role it holds
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Stable identifier of the principal
    pub id: PrincipalId,
    /// Role granted to the principal
    pub role: Role,
}

impl Principal {
    /// Constructs a principal
    pub fn new(id: impl Into<PrincipalId>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// Claims carried inside a signed access token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    sub: PrincipalId,
    role: Role,
    iat: UnixTime,
    exp: UnixTime,
}

impl AccessClaims {
    /// Claims for `principal`, valid from `issued_at` until `expires_at`
    #[must_use]
    pub fn new(principal: &Principal, issued_at: UnixTime, expires_at: UnixTime) -> Self {
        Self {
            sub: principal.id.clone(),
            role: principal.role.clone(),
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// The principal the token was issued to
    #[must_use]
    pub fn subject(&self) -> &PrincipalIdRef {
        &self.sub
    }

    /// The role granted to the subject
    #[must_use]
    pub fn role(&self) -> &RoleRef {
        &self.role
    }

    /// When the token was issued
    #[must_use]
    pub fn issued_at(&self) -> UnixTime {
        self.iat
    }

    /// When the token stops being accepted
    #[must_use]
    pub fn expires_at(&self) -> UnixTime {
        self.exp
    }

    /// The principal described by these claims
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.sub.clone(),
            role: self.role.clone(),
        }
    }
}
