//! Integration tests for the history API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use askdesk::api::public::history::HistoryResponse;
    use askdesk::history::insert_record;

    use crate::test_utils::{body_to_string, test_app};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// An identity without saved prompts gets an empty list
    #[tokio::test]
    async fn it_returns_empty_history() {
        let app = test_app().await;

        let response = app.router.oneshot(get("/api/history/nobody")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        let history: HistoryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(history.identity, "nobody");
        assert!(history.records.is_empty());
    }

    /// Records come back newest first, capped at the default limit
    #[tokio::test]
    async fn it_lists_recent_records() {
        let app = test_app().await;
        for i in 0..12 {
            insert_record(&app.db, "user-1", &format!("prompt {i}"), "**done**")
                .await
                .unwrap();
        }
        insert_record(&app.db, "user-2", "not mine", "nope").await.unwrap();

        let response = app.router.oneshot(get("/api/history/user-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        let history: HistoryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(history.records.len(), 10);
        assert_eq!(history.records[0].prompt, "prompt 11");
        assert!(history.records.iter().all(|r| r.identity == "user-1"));
        assert_eq!(history.records[0].response_html, "<strong>done</strong>");
        assert_eq!(history.records[0].created_at_display.len(), 19);
    }

    /// The `limit` query parameter overrides the default
    #[tokio::test]
    async fn it_respects_limit() {
        let app = test_app().await;
        let long_prompt = "x".repeat(80);
        insert_record(&app.db, "user-1", &long_prompt, "a").await.unwrap();
        insert_record(&app.db, "user-1", "second", "b").await.unwrap();

        let response = app
            .router
            .clone()
            .oneshot(get("/api/history/user-1?limit=1"))
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let history: HistoryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(history.records.len(), 1);
        assert_eq!(history.records[0].prompt, "second");

        let response = app
            .router
            .oneshot(get("/api/history/user-1?limit=5"))
            .await
            .unwrap();
        let body = body_to_string(response.into_body()).await;
        let history: HistoryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(history.records[1].prompt_preview, format!("{}...", "x".repeat(60)));
    }

    /// Invalid query parameters are rejected by the extractor
    #[tokio::test]
    async fn it_rejects_bad_limit() {
        let app = test_app().await;
        let response = app
            .router
            .oneshot(get("/api/history/user-1?limit=lots"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
