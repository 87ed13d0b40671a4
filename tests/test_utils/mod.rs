//! Test utilities for integration tests
#![allow(dead_code)]
use std::fs;
use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use tempfile::TempDir;
use tokio_rusqlite::Connection;

use askdesk::api::AppState;
use askdesk::api::app;
use askdesk::core::AppConfig;
use askdesk::core::db::ready_db;

pub const INDEX_HTML: &str = "<!doctype html><html><body><div id=\"app\"></div></body></html>";

/// Everything a test needs to poke at the app. The temp dir is
/// removed when this is dropped.
pub struct TestApp {
    pub router: Router,
    pub db: Connection,
    pub config: AppConfig,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    let storage_path = dir.path().display().to_string();
    AppConfig {
        db_path: dir.path().join("askdesk.sqlite").display().to_string(),
        static_root: dir.path().join("public").display().to_string(),
        storage_path,
        openai_api_hostname: String::from("http://127.0.0.1:1"),
        openai_api_key: None,
        openai_model: String::from("gpt-3.5-turbo"),
        system_message: String::from("You are a helpful assistant."),
        temperature: 0.7,
        max_tokens: 1000,
        history_limit: 10,
        status_ttl_secs: 5,
    }
}

/// Creates a test application router backed by a temporary
/// database and a static root with a few front end files.
pub async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&dir);

    let public = dir.path().join("public");
    fs::create_dir_all(public.join("js")).expect("Failed to create static directory");
    fs::write(public.join("index.html"), INDEX_HTML).unwrap();
    fs::write(public.join("style.css"), "body { margin: 0; }").unwrap();
    fs::write(public.join("js").join("app.js"), "console.log('askdesk');").unwrap();

    let db = ready_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");

    let app_state = AppState::new(db.clone(), config.clone());
    let router = app(Arc::new(RwLock::new(app_state)));

    TestApp {
        router,
        db,
        config,
        dir,
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}
