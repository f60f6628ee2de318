//! Streaming chat client struct and builder.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tokio_util::sync::CancellationToken;
use tripmate_auth::{AccessToken, CredentialProvider};

use crate::config::ChatStreamConfig;
use crate::error::{ChatStreamError, map_http_status, map_reqwest_error};
use crate::observer::{StreamObserver, drive};
use crate::streaming::parse_delta_stream;
use crate::types::{ChatMessage, ChatRequest, StreamEvent, StreamHandle};

/// Client for the backend's streaming chat function.
///
/// Holds no per-session state: every call to [`stream`](Self::stream) or
/// [`run_stream`](Self::run_stream) is an independent session with its own
/// buffer, so one client can serve several conversations at once.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tripmate_auth::StaticCredentialProvider;
/// use tripmate_stream::{ChatStreamClient, ChatStreamConfig};
///
/// let client = ChatStreamClient::new(
///     ChatStreamConfig::new("https://project.example.co").publishable_key("pk_123"),
///     Arc::new(StaticCredentialProvider::new("session-token")),
/// );
/// ```
#[derive(Clone)]
pub struct ChatStreamClient {
    pub(crate) config: ChatStreamConfig,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) client: reqwest::Client,
}

impl ChatStreamClient {
    /// Create a client for the given endpoint and credential source.
    #[must_use]
    pub fn new(config: ChatStreamConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, connect timeouts).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The endpoint configuration.
    pub fn config(&self) -> &ChatStreamConfig {
        &self.config
    }

    /// Start a session and return its events as a stream.
    ///
    /// Nothing happens until the handle is polled. The stream yields deltas in
    /// order followed by exactly one `Done` or `Error`. Cancelling `cancel`
    /// before the request is issued skips the request entirely; cancelling
    /// later drops the in-flight transfer. Both resolve as `Done`.
    pub fn stream(&self, request: ChatRequest, cancel: CancellationToken) -> StreamHandle {
        let url = self.config.stream_url();
        let api_key = self.config.publishable_key.clone();
        let credentials = Arc::clone(&self.credentials);
        let http_client = self.client.clone();

        let events = async_stream::stream! {
            if cancel.is_cancelled() {
                tracing::debug!("chat stream cancelled before request");
                yield StreamEvent::Done;
                return;
            }

            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                token = credentials.access_token() => Some(token),
            };
            let token = match token {
                None => {
                    yield StreamEvent::Done;
                    return;
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "no credential for chat stream");
                    yield StreamEvent::Error(e.into());
                    return;
                }
                Some(Ok(token)) if token.is_expired() || token.is_empty() => {
                    yield StreamEvent::Error(ChatStreamError::Authentication(
                        "access token is expired or empty".into(),
                    ));
                    return;
                }
                Some(Ok(token)) => token,
            };
            let authorization = match authorization_header(&token) {
                Ok(value) => value,
                Err(e) => {
                    yield StreamEvent::Error(e);
                    return;
                }
            };
            drop(token);

            let mut builder = http_client
                .post(&url)
                .header(AUTHORIZATION, authorization)
                .header(CONTENT_TYPE, "application/json")
                .json(&request);
            if let Some(key) = &api_key {
                builder = builder.header("apikey", key);
            }

            tracing::debug!(
                url = %url,
                conversation_id = %request.conversation_id,
                messages = request.messages.len(),
                "sending streaming chat request"
            );

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                response = builder.send() => Some(response),
            };
            let response = match sent {
                None => {
                    tracing::debug!("chat stream cancelled while awaiting headers");
                    yield StreamEvent::Done;
                    return;
                }
                Some(Err(e)) => {
                    yield StreamEvent::Error(map_reqwest_error(e));
                    return;
                }
                Some(Ok(response)) => response,
            };

            let status = response.status();
            if !status.is_success() {
                tracing::debug!(status = status.as_u16(), "chat stream rejected");
                yield StreamEvent::Error(map_http_status(status));
                return;
            }
            if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
                yield StreamEvent::Error(ChatStreamError::EmptyBody);
                return;
            }

            let mut deltas = std::pin::pin!(parse_delta_stream(response.bytes_stream(), cancel));
            while let Some(event) = deltas.next().await {
                yield event;
            }
        };

        StreamHandle {
            receiver: Box::pin(events),
        }
    }

    /// Run one session to completion, reporting through `observer`.
    ///
    /// The caller is responsible for the transcript limits (see
    /// [`ChatRequest::validate`]); they are not re-checked here. Exactly one
    /// of `on_done` / `on_error` fires before this returns.
    pub async fn run_stream<O: StreamObserver + ?Sized>(
        &self,
        messages: &[ChatMessage],
        conversation_id: &str,
        observer: &mut O,
        cancel: &CancellationToken,
    ) {
        let request = ChatRequest::new(messages.to_vec(), conversation_id);
        drive(self.stream(request, cancel.clone()), observer).await;
    }
}

/// `Authorization` value for `token`, marked sensitive so it is never logged.
fn authorization_header(token: &AccessToken) -> Result<HeaderValue, ChatStreamError> {
    let mut value = HeaderValue::from_str(&token.bearer_header()).map_err(|_| {
        ChatStreamError::Authentication("access token is not a valid header value".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

impl std::fmt::Debug for ChatStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
