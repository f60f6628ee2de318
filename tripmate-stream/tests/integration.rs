//! Integration tests for the streaming chat client using wiremock.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tripmate_auth::{AccessToken, AuthError, CredentialProvider, StaticCredentialProvider};
use tripmate_stream::{
    CancellationToken, ChatMessage, ChatRequest, ChatStreamClient, ChatStreamConfig,
    ChatStreamError, StreamEvent, StreamObserver, TurnAccumulator,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/functions/v1/ai-chat-stream";

fn delta_line(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": text } }] })
    )
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn client(server: &MockServer) -> ChatStreamClient {
    ChatStreamClient::new(
        ChatStreamConfig::new(server.uri()).publishable_key("pk_test_123"),
        Arc::new(StaticCredentialProvider::new("session-token")),
    )
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Plan 3 days in Lisbon"),
        ChatMessage::assistant("Sure! When are you travelling?"),
        ChatMessage::user("Next May"),
    ]
}

/// Records every callback in order.
#[derive(Default)]
struct Recorder {
    deltas: Vec<String>,
    done: usize,
    errors: Vec<ChatStreamError>,
}

impl StreamObserver for Recorder {
    fn on_delta(&mut self, text: &str) {
        self.deltas.push(text.to_string());
    }
    fn on_done(&mut self) {
        self.done += 1;
    }
    fn on_error(&mut self, error: ChatStreamError) {
        self.errors.push(error);
    }
}

#[tokio::test]
async fn sends_credentials_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer session-token"))
        .and(header("apikey", "pk_test_123"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "messages": [
                { "role": "user", "content": "Plan 3 days in Lisbon" },
                { "role": "assistant", "content": "Sure! When are you travelling?" },
                { "role": "user", "content": "Next May" }
            ],
            "conversationId": "conv-42"
        })))
        .respond_with(sse_response("data: [DONE]\n".into()))
        .expect(1)
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "conv-42", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.done, 1);
    assert!(rec.errors.is_empty(), "unexpected errors: {:?}", rec.errors);
}

#[tokio::test]
async fn three_deltas_then_done() {
    let server = MockServer::start().await;
    let body = [delta_line("Day 1: "), delta_line("Alfama, "), delta_line("Belém")].concat()
        + "data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.deltas, vec!["Day 1: ", "Alfama, ", "Belém"]);
    assert_eq!(rec.done, 1);
    assert!(rec.errors.is_empty());
}

#[tokio::test]
async fn keep_alive_comments_are_ignored() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\n{}: keep-alive\n\n{}\ndata: [DONE]\n",
        delta_line("first"),
        delta_line("second")
    );

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.deltas, vec!["first", "second"]);
    assert_eq!(rec.done, 1);
}

#[tokio::test]
async fn eof_without_sentinel_flushes_last_line() {
    let server = MockServer::start().await;
    let last = delta_line("tail");
    let body = delta_line("head") + last.trim_end_matches('\n');

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.deltas, vec!["head", "tail"]);
    assert_eq!(rec.done, 1);
    assert!(rec.errors.is_empty());
}

#[tokio::test]
async fn crlf_framing_is_accepted() {
    let server = MockServer::start().await;
    let body = delta_line("windows").replace('\n', "\r\n") + "data: [DONE]\r\n";

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.deltas, vec!["windows"]);
    assert_eq!(rec.done, 1);
}

#[tokio::test]
async fn status_429_reports_rate_limit_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string(delta_line("never read")))
        .expect(1)
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert!(rec.deltas.is_empty());
    assert_eq!(rec.done, 0);
    assert_eq!(rec.errors.len(), 1);
    assert!(
        matches!(rec.errors[0], ChatStreamError::RateLimited),
        "expected RateLimited, got: {:?}",
        rec.errors[0]
    );
}

#[tokio::test]
async fn status_402_reports_quota_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": "Payment required"
        })))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.errors.len(), 1);
    assert!(matches!(rec.errors[0], ChatStreamError::QuotaExhausted));
    assert_eq!(rec.done, 0);
}

#[tokio::test]
async fn other_status_reports_request_failed_with_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "AI service error"
        })))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = client(&server)
        .stream(ChatRequest::new(messages(), "c"), CancellationToken::new())
        .receiver
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error(err @ ChatStreamError::RequestFailed { status: 500 }) => {
            assert!(err.to_string().contains("500"));
            assert!(err.is_retryable());
        }
        other => panic!("expected RequestFailed(500), got: {other:?}"),
    }
}

#[tokio::test]
async fn empty_success_body_reports_empty_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.errors.len(), 1);
    assert!(matches!(rec.errors[0], ChatStreamError::EmptyBody));
    assert_eq!(rec.done, 0);
}

#[tokio::test]
async fn failed_credential_never_reaches_server() {
    struct SignedOut;

    #[async_trait::async_trait]
    impl CredentialProvider for SignedOut {
        async fn access_token(&self) -> Result<AccessToken, AuthError> {
            Err(AuthError::NotAuthenticated("no session".into()))
        }
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse_response("data: [DONE]\n".into()))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatStreamClient::new(ChatStreamConfig::new(server.uri()), Arc::new(SignedOut));
    let mut rec = Recorder::default();
    client
        .run_stream(&messages(), "c", &mut rec, &CancellationToken::new())
        .await;

    assert_eq!(rec.errors.len(), 1);
    assert!(matches!(rec.errors[0], ChatStreamError::Authentication(_)));
    assert_eq!(rec.done, 0);
}

#[tokio::test]
async fn cancelled_before_start_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse_response(delta_line("x")))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    cancel.cancel();

    let mut rec = Recorder::default();
    client(&server)
        .run_stream(&messages(), "c", &mut rec, &cancel)
        .await;

    assert!(rec.deltas.is_empty());
    assert_eq!(rec.done, 1);
    assert!(rec.errors.is_empty());
}

#[tokio::test]
async fn cancel_while_awaiting_headers_completes_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(delta_line("late")).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut rec = Recorder::default();
    tokio::time::timeout(
        Duration::from_secs(2),
        client(&server).run_stream(&messages(), "c", &mut rec, &cancel),
    )
    .await
    .expect("cancellation should end the session promptly");

    assert!(rec.deltas.is_empty());
    assert_eq!(rec.done, 1);
    assert!(rec.errors.is_empty());
}

#[tokio::test]
async fn cancel_after_first_delta_stops_delivery() {
    let server = MockServer::start().await;
    let body = [delta_line("one"), delta_line("two"), delta_line("three")].concat();

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    /// Cancels its own session as soon as the first delta arrives.
    struct CancelOnFirst {
        cancel: CancellationToken,
        rec: Recorder,
    }

    impl StreamObserver for CancelOnFirst {
        fn on_delta(&mut self, text: &str) {
            self.rec.on_delta(text);
            self.cancel.cancel();
        }
        fn on_done(&mut self) {
            self.rec.on_done();
        }
        fn on_error(&mut self, error: ChatStreamError) {
            self.rec.on_error(error);
        }
    }

    let cancel = CancellationToken::new();
    let mut observer = CancelOnFirst {
        cancel: cancel.clone(),
        rec: Recorder::default(),
    };
    client(&server)
        .run_stream(&messages(), "c", &mut observer, &cancel)
        .await;

    assert_eq!(observer.rec.deltas, vec!["one"]);
    assert_eq!(observer.rec.done, 1);
    assert!(observer.rec.errors.is_empty());
}

#[tokio::test]
async fn concurrent_sessions_are_independent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_json(serde_json::json!({
            "messages": [{ "role": "user", "content": "A" }],
            "conversationId": "a"
        })))
        .respond_with(sse_response(delta_line("alpha") + "data: [DONE]\n"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_json(serde_json::json!({
            "messages": [{ "role": "user", "content": "B" }],
            "conversationId": "b"
        })))
        .respond_with(sse_response(delta_line("beta") + "data: [DONE]\n"))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut a = TurnAccumulator::new();
    let mut b = TurnAccumulator::new();
    let cancel = CancellationToken::new();
    let messages_a = [ChatMessage::user("A")];
    let messages_b = [ChatMessage::user("B")];
    tokio::join!(
        client.run_stream(&messages_a, "a", &mut a, &cancel),
        client.run_stream(&messages_b, "b", &mut b, &cancel),
    );

    assert_eq!(a.text(), "alpha");
    assert_eq!(b.text(), "beta");
    assert!(a.is_finished() && b.is_finished());
}
