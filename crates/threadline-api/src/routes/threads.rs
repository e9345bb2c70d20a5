use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{error::ApiResult, state::AppState};

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
}

impl PageQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

/// Most recent messages of a thread, oldest first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let messages = state.session.messages(&thread_id, page.limit()).await?;
    Ok(Json(json!({
        "thread_id": thread_id,
        "messages": messages,
    })))
}

/// Threads of a user, newest first
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let threads = state.session.threads(&user_id, page.limit()).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "threads": threads,
    })))
}
