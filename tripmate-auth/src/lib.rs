#![deny(missing_docs)]
//! Bearer credential providers for the TripMate chat backend.
//!
//! The streaming chat client never owns a user session. Before each request
//! it asks a [`CredentialProvider`] for an [`AccessToken`] and fails the
//! session with an authentication error when none is available.
//!
//! Providers in this crate:
//!
//! - [`StaticCredentialProvider`]: a fixed token (dev/test).
//! - [`EnvCredentialProvider`]: reads the token from an environment variable.
//! - [`CredentialProviderChain`]: tries providers in order until one succeeds.

mod env;
mod static_token;

pub use env::{DEFAULT_TOKEN_VAR, EnvCredentialProvider};
pub use static_token::StaticCredentialProvider;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from credential providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential is available (signed out, variable unset, etc.).
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// A credential exists but has expired.
    #[error("token expired")]
    Expired,
}

/// An opaque bearer token with optional expiry.
///
/// Memory is zeroed on drop. The token is only readable through
/// [`AccessToken::with_secret`], and `Debug` never prints it.
pub struct AccessToken {
    inner: Zeroizing<String>,
    expires_at: Option<SystemTime>,
}

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>, expires_at: Option<SystemTime>) -> Self {
        Self {
            inner: Zeroizing::new(token.into()),
            expires_at,
        }
    }

    /// Create a token that never expires.
    pub fn permanent(token: impl Into<String>) -> Self {
        Self::new(token, None)
    }

    /// Scoped exposure of the token text.
    pub fn with_secret<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.inner)
    }

    /// Render the `Authorization` header value (`Bearer <token>`).
    ///
    /// The returned buffer is zeroed on drop like the token itself.
    pub fn bearer_header(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("Bearer {}", self.inner.as_str()))
    }

    /// Whether the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Check if this token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| SystemTime::now() > exp)
            .unwrap_or(false)
    }

    /// Returns when this token expires, if known.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies the bearer credential attached to backend requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return the current access token, or fail if the caller is signed out.
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}

#[async_trait]
impl<T: CredentialProvider + ?Sized> CredentialProvider for Arc<T> {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        (**self).access_token().await
    }
}

/// Tries providers in order until one yields a usable token.
///
/// Empty and expired tokens count as failures and the chain moves on.
pub struct CredentialProviderChain {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl CredentialProviderChain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider to the end of the chain.
    pub fn with_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add a provider to the end of the chain (mutable).
    pub fn add(&mut self, provider: Arc<dyn CredentialProvider>) {
        self.providers.push(provider);
    }
}

impl Default for CredentialProviderChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for CredentialProviderChain {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.access_token().await {
                Ok(token) if token.is_expired() => last_err = Some(AuthError::Expired),
                Ok(token) if token.is_empty() => {
                    last_err = Some(AuthError::NotAuthenticated("empty token".into()))
                }
                Ok(token) => return Ok(token),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| AuthError::NotAuthenticated("no providers configured".into())))
    }
}
