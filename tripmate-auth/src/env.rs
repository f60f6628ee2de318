//! Credential provider that reads the bearer token from the environment.

use async_trait::async_trait;

use crate::{AccessToken, AuthError, CredentialProvider};

/// Variable read by [`EnvCredentialProvider::new`].
pub const DEFAULT_TOKEN_VAR: &str = "TRIPMATE_ACCESS_TOKEN";

/// Reads the access token from a process environment variable on every call,
/// so a rotated token is picked up without rebuilding the client.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var_name: String,
}

impl EnvCredentialProvider {
    /// Read from [`DEFAULT_TOKEN_VAR`].
    pub fn new() -> Self {
        Self::from_var(DEFAULT_TOKEN_VAR)
    }

    /// Read from a custom variable.
    pub fn from_var(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    /// The variable this provider reads.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        match std::env::var(&self.var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(AccessToken::permanent(val)),
            Ok(_) => Err(AuthError::NotAuthenticated(format!(
                "env var {} is empty",
                self.var_name
            ))),
            Err(_) => Err(AuthError::NotAuthenticated(format!(
                "env var {} not set",
                self.var_name
            ))),
        }
    }
}
