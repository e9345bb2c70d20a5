use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use threadline::ChatResponse;

use super::SendMessageRequest;
use crate::{error::ApiResult, state::AppState};

/// Answer a turn in an existing (or client-named) thread
pub async fn respond_in_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let request = req.into_chat_request(Some(thread_id), state.config.default_model())?;
    Ok(Json(state.session.respond(request).await?))
}

/// Answer the first turn of a new thread
pub async fn respond(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let request = req.into_chat_request(None, state.config.default_model())?;
    Ok(Json(state.session.respond(request).await?))
}
