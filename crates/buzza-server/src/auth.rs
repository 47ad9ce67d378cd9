//! Request authentication.
//!
//! The server does not own user accounts. An [`Authenticator`] turns a bearer
//! token into a verified [`AuthenticatedUser`], which the auth middleware
//! stores in the request extensions before protected handlers run.

use std::collections::HashMap;

use async_trait::async_trait;
use buzza_core::error::BuzzaResult;

/// Verified identity of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` means the token is unknown or expired.
    async fn authenticate(&self, token: &str) -> BuzzaResult<Option<AuthenticatedUser>>;
}

/// Fixed token table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, i64>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, i64>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> BuzzaResult<Option<AuthenticatedUser>> {
        Ok(self
            .tokens
            .get(token)
            .map(|&id| AuthenticatedUser { id }))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` (or `Token <token>`) header.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Token abc "), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
    }

    #[tokio::test]
    async fn test_static_tokens() {
        let auth = StaticTokenAuthenticator::new(HashMap::from([("secret".to_string(), 42)]));
        assert_eq!(
            auth.authenticate("secret").await.unwrap(),
            Some(AuthenticatedUser { id: 42 })
        );
        assert_eq!(auth.authenticate("other").await.unwrap(), None);
    }
}
