//! Router for the history API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use super::public;
use crate::api::state::AppState;
use crate::history::find_recent_records;

type SharedState = Arc<RwLock<AppState>>;

/// Most recent saved exchanges for one identity, newest first
async fn history_list(
    State(state): State<SharedState>,
    Path(identity): Path<String>,
    Query(params): Query<public::HistoryQuery>,
) -> Result<Json<public::HistoryResponse>, crate::api::public::ApiError> {
    let (db, default_limit) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), shared_state.config.history_limit)
    };
    let limit = params.limit.unwrap_or(default_limit);
    let records = find_recent_records(&db, &identity, limit).await?;

    Ok(Json(public::HistoryResponse {
        identity,
        records: records.into_iter().map(public::HistoryRecord::from).collect(),
    }))
}

/// Create the history router
pub fn router() -> Router<SharedState> {
    Router::new().route("/{identity}", get(history_list))
}
