//! Chat-with-data handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use spendboard_common::assistant::AssistantReply;
use spendboard_common::errors::{AppError, Result};
use validator::Validate;

use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(alias = "query")]
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

/// Forward a natural-language question to the text-to-SQL service
pub async fn chat_with_data(
    State(state): State<AppState>,
    request: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AssistantReply>> {
    let Json(request) = request?;
    request.validate()?;

    let chat = state.chat.as_ref().ok_or_else(|| AppError::ServiceUnavailable {
        message: "chat assistant is not configured".to_string(),
    })?;

    Ok(Json(chat.answer(&request.question).await?))
}
