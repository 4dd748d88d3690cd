use crate::server::AppState;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use sl_channels::{InboundMessage, parse_notification};
use sl_sheets::LogRow;
use std::sync::Arc;

/// Fixed auto-reply sent for every inbound message.
pub const REPLY_BODY: &str = "Thanks for your message. We will get back to you shortly.";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echo the challenge iff mode and token match.
#[tracing::instrument(level = "debug", skip_all)]
async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let mode = query.mode.as_deref().unwrap_or_default();
    let token = query.verify_token.as_deref().unwrap_or_default();
    if mode == "subscribe" && token == state.verify_token {
        return (StatusCode::OK, query.challenge.unwrap_or_default()).into_response();
    }
    StatusCode::FORBIDDEN.into_response()
}

/// Notification delivery: log every message to the sheet and auto-reply.
///
/// The body is parsed inside the handler so a malformed payload takes the
/// same generic failure path as a downstream error. The first failure
/// aborts the batch; the platform retries whole deliveries, not messages.
#[tracing::instrument(level = "info", skip_all)]
async fn receive_webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match process_notification(&state, &body).await {
        Ok(count) => {
            tracing::debug!(messages = count, "webhook batch processed");
            StatusCode::OK.into_response()
        }
        Err(error) => {
            tracing::error!(error = %error, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn process_notification(state: &AppState, body: &[u8]) -> anyhow::Result<usize> {
    let messages = parse_notification(body)?;
    let count = messages.len();
    for message in &messages {
        log_and_reply(state, message).await?;
    }
    Ok(count)
}

async fn log_and_reply(state: &AppState, message: &InboundMessage) -> anyhow::Result<()> {
    let row = LogRow {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        from: message.sender.clone(),
        message: message.text.clone(),
        kind: message.kind.clone(),
        message_id: message.id.clone(),
        raw: message.raw.clone(),
    };
    state.appender.append_row(&row).await?;
    state.replies.send_text(&message.sender, REPLY_BODY).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{REPLY_BODY, router};
    use crate::server::AppState;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use sl_channels::ReplySender;
    use sl_sheets::{LogRow, RowAppender, SheetsError};
    use std::sync::{Arc, Mutex};
    use tower::util::ServiceExt;

    struct RecordingAppender {
        rows: Mutex<Vec<LogRow>>,
        fail: bool,
    }

    impl RecordingAppender {
        fn new(fail: bool) -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl RowAppender for RecordingAppender {
        async fn append_row(&self, row: &LogRow) -> Result<(), SheetsError> {
            if self.fail {
                return Err(SheetsError::Api("append rejected".to_string()));
            }
            self.rows.lock().expect("rows lock").push(row.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .expect("sent lock")
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn test_state(
        fail_appends: bool,
    ) -> (Arc<AppState>, Arc<RecordingAppender>, Arc<RecordingSender>) {
        let appender = Arc::new(RecordingAppender::new(fail_appends));
        let sender = Arc::new(RecordingSender::default());
        let state = Arc::new(AppState {
            verify_token: "sekrit".to_string(),
            appender: appender.clone(),
            replies: sender.clone(),
        });
        (state, appender, sender)
    }

    async fn post_webhook(state: Arc<AppState>, payload: serde_json::Value) -> axum::response::Response {
        router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    fn text_message_payload(from: &str, body: &str, id: &str) -> serde_json::Value {
        json!({
            "entry": [ { "changes": [ { "value": { "messages": [ {
                "from": from,
                "id": id,
                "type": "text",
                "text": { "body": body },
            } ] } } ] } ],
        })
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn handshake_echoes_challenge_for_valid_token() {
        let (state, _, _) = test_state(false);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=sekrit&hub.challenge=1158201444")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "1158201444");
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_token_with_empty_body() {
        let (state, _, _) = test_state(false);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_mode() {
        let (state, _, _) = test_state(false);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=unsubscribe&hub.verify_token=sekrit&hub.challenge=abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handshake_rejects_missing_query() {
        let (state, _, _) = test_state(false);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/webhook")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_payloads_are_accepted_without_external_calls() {
        let (state, appender, sender) = test_state(false);
        for payload in [json!({}), json!({ "entry": [] })] {
            let response = post_webhook(state.clone(), payload).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.is_empty());
        }
        assert!(appender.rows.lock().expect("rows lock").is_empty());
        assert!(sender.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn text_message_is_logged_and_replied_to() {
        let (state, appender, sender) = test_state(false);
        let response =
            post_webhook(state, text_message_payload("15551234567", "Hello", "wamid.abc")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let rows = appender.rows.lock().expect("rows lock");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].from, "15551234567");
        assert_eq!(rows[0].message, "Hello");
        assert_eq!(rows[0].kind, "text");
        assert_eq!(rows[0].message_id, "wamid.abc");
        assert!(rows[0].raw.contains("wamid.abc"));
        assert!(rows[0].timestamp.ends_with('Z'));

        let sent = sender.sent.lock().expect("sent lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15551234567");
        assert_eq!(sent[0].1, REPLY_BODY);
    }

    #[tokio::test]
    async fn media_message_logs_the_placeholder_text() {
        let (state, appender, _) = test_state(false);
        let payload = json!({
            "entry": [ { "changes": [ { "value": { "messages": [ {
                "from": "15551234567",
                "id": "wamid.img",
                "type": "image",
                "image": { "id": "media-1" },
            } ] } } ] } ],
        });
        let response = post_webhook(state, payload).await;
        assert_eq!(response.status(), StatusCode::OK);

        let rows = appender.rows.lock().expect("rows lock");
        assert_eq!(rows[0].message, "Unsupported type");
        assert_eq!(rows[0].kind, "image");
    }

    #[tokio::test]
    async fn append_failure_aborts_the_batch() {
        let (state, _, sender) = test_state(true);
        let payload = json!({
            "entry": [ { "changes": [ { "value": { "messages": [
                { "from": "1", "id": "a", "type": "text", "text": { "body": "one" } },
                { "from": "2", "id": "b", "type": "text", "text": { "body": "two" } },
            ] } } ] } ],
        });
        let response = post_webhook(state, payload).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
        assert!(sender.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_a_server_error() {
        let (state, _, _) = test_state(false);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from("not json"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn duplicate_deliveries_are_processed_twice() {
        let (state, appender, sender) = test_state(false);
        let payload = text_message_payload("15551234567", "Hello", "wamid.abc");
        for _ in 0..2 {
            let response = post_webhook(state.clone(), payload.clone()).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(appender.rows.lock().expect("rows lock").len(), 2);
        assert_eq!(sender.sent.lock().expect("sent lock").len(), 2);
    }
}
