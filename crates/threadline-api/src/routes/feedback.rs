use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use threadline::{PersistError, SessionError};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub positive: bool,
}

pub async fn set_feedback(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<StatusCode> {
    match state.session.feedback(&message_id, req.positive).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(SessionError::Persistence(PersistError::MessageNotFound(_))) => {
            Err(ApiError::MessageNotFound(message_id))
        }
        Err(e) => Err(e.into()),
    }
}
