//! Integration tests for serving the front end

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use std::fs;

    use tower::util::ServiceExt;

    use crate::test_utils::{INDEX_HTML, body_to_string, test_app};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn content_type(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// The root path serves index.html
    #[tokio::test]
    async fn it_serves_index_at_root() {
        let app = test_app().await;
        let response = app.router.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type(&response).starts_with("text/html"));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
        assert_eq!(body_to_string(response.into_body()).await, INDEX_HTML);
    }

    /// Content type follows the file extension
    #[tokio::test]
    async fn it_infers_content_types() {
        let app = test_app().await;

        let response = app.router.clone().oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type(&response).starts_with("text/css"));

        let response = app.router.oneshot(get("/js/app.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type(&response).contains("javascript"));
        assert_eq!(
            body_to_string(response.into_body()).await,
            "console.log('askdesk');"
        );
    }

    /// Unknown paths fall back to index.html so client side routes load
    #[tokio::test]
    async fn it_falls_back_to_index() {
        let app = test_app().await;
        let response = app.router.oneshot(get("/settings/profile")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type(&response).starts_with("text/html"));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
        assert_eq!(body_to_string(response.into_body()).await, INDEX_HTML);
    }

    /// Paths that exist but can't be read are server errors, not a
    /// fallback to the index
    #[tokio::test]
    async fn it_errors_on_unreadable_files() {
        let app = test_app().await;
        let public = app.dir.path().join("public");

        // A file used as a directory
        let response = app
            .router
            .clone()
            .oneshot(get("/style.css/theme.css"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        #[cfg(unix)]
        {
            use std::os::unix::fs::{PermissionsExt, symlink};

            // Symlink loop
            symlink(public.join("loop.css"), public.join("loop.css")).unwrap();
            let response = app.router.clone().oneshot(get("/loop.css")).await.unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            // No read permission, only checked when the process really
            // can't read it (root can)
            let secret = public.join("secret.css");
            fs::write(&secret, "body {}").unwrap();
            fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
            if fs::File::open(&secret).is_err() {
                let response = app.router.clone().oneshot(get("/secret.css")).await.unwrap();
                assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            }
        }

        // Readable files are unaffected
        let response = app.router.oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// The fallback is a server error when there is no index.html
    #[tokio::test]
    async fn it_errors_without_index() {
        let app = test_app().await;
        fs::remove_file(app.dir.path().join("public").join("index.html")).unwrap();

        let response = app
            .router
            .clone()
            .oneshot(get("/settings/profile"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );

        let response = app.router.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Existing assets are still served
        let response = app.router.oneshot(get("/js/app.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
