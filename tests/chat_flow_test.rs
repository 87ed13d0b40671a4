//! End to end tests of a chat session against a fake completion API
//! and a real database

mod test_utils;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    use askdesk::api::public::history::HistoryResponse;
    use askdesk::auth::Identity;
    use askdesk::chat::{ChatSession, EntryRole, Settled, SubmitError};
    use askdesk::history::{SqliteSessionStore, count_records, find_user};
    use askdesk::openai::{CompletionError, OpenAiClient};

    use crate::test_utils::{body_to_string, test_app};

    const KEY: &str = "sk-abcdefghijklmnopqrstuvwxyz0123";

    fn completion_body(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    fn session_for(server: &mockito::ServerGuard, db: tokio_rusqlite::Connection) -> ChatSession {
        let completer = Arc::new(OpenAiClient::new(&server.url()));
        let store = Arc::new(SqliteSessionStore::new(db));
        ChatSession::builder(completer, store).build()
    }

    /// A prompt goes out, the answer comes back, the exchange is saved
    /// and visible over the history API
    #[tokio::test]
    async fn it_saves_successful_exchanges() {
        let app = test_app().await;
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", format!("Bearer {}", KEY).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hello"))
            .create_async()
            .await;

        let session = session_for(&server, app.db.clone());
        session.set_api_key(KEY).unwrap();
        let identity = Identity::new("user-1", Some("Ada"), Some("ada@example.com"));
        session.auth().sign_in(identity.clone());
        session.on_identity_change(Some(identity)).await;
        assert!(find_user(&app.db, "user-1").await.unwrap().is_some());

        let settled = session.submit("Say hello").await.unwrap();
        mock.assert_async().await;
        assert!(matches!(settled, Settled::Success { record_id: Some(_), .. }));

        let assistant: Vec<String> = session
            .transcript()
            .into_iter()
            .filter(|e| e.role == EntryRole::Assistant)
            .map(|e| e.text)
            .collect();
        assert_eq!(assistant, vec!["Hello"]);
        assert_eq!(count_records(&app.db, "user-1").await.unwrap(), 1);
        assert_eq!(session.saved().len(), 1);

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/history/user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        let history: HistoryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(history.records.len(), 1);
        assert_eq!(history.records[0].prompt, "Say hello");
        assert_eq!(history.records[0].response, "Hello");
    }

    /// Remote failures are shown and nothing is saved
    #[tokio::test]
    async fn it_does_not_save_failed_exchanges() {
        let app = test_app().await;
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"error": {"type": "rate_limit_error", "message": "Slow down"}}).to_string(),
            )
            .create_async()
            .await;

        let session = session_for(&server, app.db.clone());
        session.keys().set(KEY).unwrap();
        session.auth().sign_in(Identity::new("user-1", None, None));

        let settled = session.submit("Hi").await.unwrap();
        assert_eq!(settled, Settled::Failed(CompletionError::RateLimited));

        let statuses: Vec<String> = session
            .transcript()
            .into_iter()
            .filter(|e| e.is_status())
            .map(|e| e.text)
            .collect();
        assert_eq!(
            statuses,
            vec!["Error: Rate limit exceeded. Please try again later."]
        );
        assert_eq!(count_records(&app.db, "user-1").await.unwrap(), 0);
    }

    /// Nothing reaches the network without a key and an identity
    #[tokio::test]
    async fn it_blocks_unauthenticated_prompts() {
        let app = test_app().await;
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let session = session_for(&server, app.db.clone());
        assert_eq!(session.submit("Hi").await, Err(SubmitError::MissingApiKey));
        session.keys().set(KEY).unwrap();
        assert_eq!(session.submit("Hi").await, Err(SubmitError::AuthRequired));

        mock.assert_async().await;
        assert_eq!(count_records(&app.db, "user-1").await.unwrap(), 0);
    }
}
