//! Configuration for [`ChatStreamClient`](crate::ChatStreamClient).

use crate::error::ConfigError;

/// Local backend URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:54321";

/// Path of the streaming chat function under the backend URL.
pub const DEFAULT_FUNCTION_PATH: &str = "/functions/v1/ai-chat-stream";

/// Environment variable holding the backend URL.
pub const BACKEND_URL_VAR: &str = "TRIPMATE_BACKEND_URL";

/// Environment variable holding the publishable API key sent as `apikey`.
pub const PUBLISHABLE_KEY_VAR: &str = "TRIPMATE_PUBLISHABLE_KEY";

/// Where and how to reach the streaming chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatStreamConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Publishable key for gateway identification. Not a secret.
    pub publishable_key: Option<String>,
    /// Function path appended to `base_url`.
    pub function_path: String,
}

impl Default for ChatStreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            publishable_key: None,
            function_path: DEFAULT_FUNCTION_PATH.into(),
        }
    }
}

impl ChatStreamConfig {
    /// Config pointing at `base_url` with the default function path.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the publishable key sent in the `apikey` header.
    #[must_use]
    pub fn publishable_key(mut self, key: impl Into<String>) -> Self {
        self.publishable_key = Some(key.into());
        self
    }

    /// Override the function path.
    #[must_use]
    pub fn function_path(mut self, path: impl Into<String>) -> Self {
        self.function_path = path.into();
        self
    }

    /// Load from [`BACKEND_URL_VAR`] (required) and [`PUBLISHABLE_KEY_VAR`]
    /// (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = non_empty(BACKEND_URL_VAR).ok_or(ConfigError::MissingVar(BACKEND_URL_VAR))?;
        let mut config = Self::new(base_url.trim());
        if let Some(key) = non_empty(PUBLISHABLE_KEY_VAR) {
            config = config.publishable_key(key.trim());
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::InvalidUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.function_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
