//! Static credential provider that always returns the same token.
//!
//! Intended for dev/test use and for callers that already hold a session
//! token obtained elsewhere.

use async_trait::async_trait;

use crate::{AccessToken, AuthError, CredentialProvider};

/// A credential provider that always returns the same token.
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    /// Create with a fixed token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        if self.token.trim().is_empty() {
            return Err(AuthError::NotAuthenticated("empty static token".into()));
        }
        Ok(AccessToken::permanent(self.token.clone()))
    }
}
