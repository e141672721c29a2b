//! Resolution of credentials to principals

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::{error::ResolveError, Email, EmailRef, Password, PasswordRef, Principal};

/// Looks up and verifies a principal by email and password
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolves the principal owning `email`, if `password` matches
    ///
    /// Implementations must report an unknown email and a wrong password
    /// identically, as [`ResolveError::Rejected`].
    async fn resolve(
        &self,
        email: &EmailRef,
        password: &PasswordRef,
    ) -> Result<Principal, ResolveError>;
}

struct Account {
    password: Password,
    principal: Principal,
}

/// A fixed, in-memory table of accounts
///
/// Suitable for tests and demonstrations. Passwords are held in the clear
/// and compared in constant time.
#[derive(Default)]
pub struct StaticPrincipalResolver {
    accounts: HashMap<Email, Account>,
}

impl fmt::Debug for StaticPrincipalResolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StaticPrincipalResolver")
            .field("accounts", &self.accounts.len())
            .finish()
    }
}

impl StaticPrincipalResolver {
    /// An empty table that rejects everyone
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account, replacing any existing one for the same email
    pub fn with_account(
        mut self,
        email: impl Into<Email>,
        password: impl Into<Password>,
        principal: Principal,
    ) -> Self {
        self.accounts.insert(
            email.into(),
            Account {
                password: password.into(),
                principal,
            },
        );
        self
    }
}

#[async_trait]
impl PrincipalResolver for StaticPrincipalResolver {
    async fn resolve(
        &self,
        email: &EmailRef,
        password: &PasswordRef,
    ) -> Result<Principal, ResolveError> {
        let account = self.accounts.get(email).ok_or(ResolveError::Rejected)?;

        let matches: bool = account
            .password
            .as_str()
            .as_bytes()
            .ct_eq(password.as_str().as_bytes())
            .into();

        if matches {
            Ok(account.principal.clone())
        } else {
            Err(ResolveError::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticPrincipalResolver {
        StaticPrincipalResolver::new().with_account(
            "a@example.com",
            "pw",
            Principal::new("1", "admin"),
        )
    }

    #[tokio::test]
    async fn resolves_matching_credentials() -> color_eyre::Result<()> {
        let principal = resolver()
            .resolve(EmailRef::from_str("a@example.com"), PasswordRef::from_str("pw"))
            .await?;

        assert_eq!(principal, Principal::new("1", "admin"));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let resolver = resolver();

        let wrong_password = resolver
            .resolve(EmailRef::from_str("a@example.com"), PasswordRef::from_str("nope"))
            .await;
        let unknown_email = resolver
            .resolve(EmailRef::from_str("b@example.com"), PasswordRef::from_str("pw"))
            .await;
        let prefix_password = resolver
            .resolve(EmailRef::from_str("a@example.com"), PasswordRef::from_str("p"))
            .await;

        assert!(matches!(wrong_password, Err(ResolveError::Rejected)));
        assert!(matches!(unknown_email, Err(ResolveError::Rejected)));
        assert!(matches!(prefix_password, Err(ResolveError::Rejected)));
    }
}
