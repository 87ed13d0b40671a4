use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::middleware;
use axum::{
    Router,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::AppState;
use crate::core::{AppConfig, db::ready_db, init_tracing};

async fn set_static_cache_control(request: Request, next: middleware::Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Map a request path onto the static root. `None` for paths that
/// try to leave the root.
fn resolve_static_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(uri_path).ok()?;
    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

/// Open the file a static request will be answered with. Only a
/// missing file falls back to the index. Any other error, a path
/// that is not a regular file and a missing index are all errors.
async fn check_static_read(root: &Path, uri_path: &str) -> io::Result<()> {
    let index = root.join("index.html");
    let Some(path) = resolve_static_path(root, uri_path) else {
        return Ok(());
    };
    let target = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => path.join("index.html"),
        Ok(meta) if meta.is_file() => path,
        Ok(_) => return Err(io::Error::other("not a regular file")),
        Err(err) if err.kind() == io::ErrorKind::NotFound => index.clone(),
        Err(err) => return Err(err),
    };
    match tokio::fs::File::open(&target).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound && target != index => {
            tokio::fs::File::open(&index).await.map(|_| ())
        }
        Err(err) => Err(err),
    }
}

async fn guard_static_reads(
    State(root): State<Arc<PathBuf>>,
    request: Request,
    next: middleware::Next,
) -> Response {
    if let Err(err) = check_static_read(&root, request.uri().path()).await {
        tracing::error!("Error serving {}: {}", request.uri().path(), err);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server Error").into_response();
    }
    next.run(request).await
}

pub fn app(shared_state: Arc<RwLock<AppState>>) -> Router {
    let cors = CorsLayer::permissive();
    let static_root = shared_state
        .read()
        .expect("Unable to read share state")
        .config
        .static_root
        .clone();
    // Unknown paths get the front end's entry point so client side
    // routing works
    let index = Path::new(&static_root).join("index.html");
    let root = Arc::new(PathBuf::from(&static_root));

    Router::new()
        // API routes
        .nest("/api", routes::router())
        // Static server of the front end assets
        .fallback_service(
            ServiceBuilder::new()
                .layer(middleware::from_fn(set_static_cache_control))
                .layer(middleware::from_fn_with_state(root, guard_static_reads))
                .service(ServeDir::new(&static_root).fallback(ServeFile::new(index))),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::clone(&shared_state))
}

// Run the server
pub async fn serve(host: String, port: String, config: AppConfig) -> Result<()> {
    // axum logs rejections from built-in extractors with the `axum::rejection`
    // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
    init_tracing(&format!(
        "{}=debug,tower_http=debug,axum::rejection=trace",
        env!("CARGO_CRATE_NAME")
    ));

    let db = ready_db(&config.db_path).await?;
    tracing::debug!(
        "Serving {} with database {}",
        config.static_root,
        config.db_path
    );

    let app_state = AppState::new(db, config);
    let shared_state = Arc::new(RwLock::new(app_state));
    let app = app(Arc::clone(&shared_state));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    tracing::debug!("Server started. Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
