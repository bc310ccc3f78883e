//! Chat API handler.
//!
//! Validates the incoming turn, dispatches it, and maps failure classes to
//! HTTP responses carrying remediation hints.

use crate::models::ChatMessage;
use crate::services::providers::{ApiErrorKind, SourceAttribution};
use crate::startup::AppState;
use axum::{extract::State, Json};
use chat_core::error::AppError;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single chat turn from the page, with the transcript it owns.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    /// The new user message.
    #[validate(length(min = 1, max = 8192, message = "message must not be empty"))]
    pub message: String,
    /// Prior turns, oldest first. The dispatcher truncates to its window.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// The assistant's reply plus any grounding citations.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub sources: Vec<SourceAttribution>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        history_len = payload.history.len(),
        message_len = payload.message.len(),
        "Dispatching chat turn"
    );

    let result = state
        .dispatcher
        .dispatch(&payload.message, &payload.history)
        .await
        .map_err(api_error_to_app_error)?;

    Ok(Json(ChatResponse {
        reply: result.text,
        sources: result.sources,
    }))
}

/// Retry-After hint attached to quota responses, in seconds.
const QUOTA_RETRY_AFTER_SECS: u64 = 30;

/// Fold a provider failure class and its remediation hint into the HTTP
/// error surface.
fn api_error_to_app_error(kind: ApiErrorKind) -> AppError {
    let message = match kind.remediation() {
        Some(hint) => format!("{}. {}", kind, hint),
        None => kind.to_string(),
    };

    match kind {
        ApiErrorKind::Unauthenticated(_) => AppError::Unauthorized(anyhow::anyhow!(message)),
        ApiErrorKind::PermissionDenied(_) => AppError::Forbidden(anyhow::anyhow!(message)),
        ApiErrorKind::ResourceExhausted(_) => {
            AppError::TooManyRequests(message, Some(QUOTA_RETRY_AFTER_SECS))
        }
        ApiErrorKind::Api { .. } | ApiErrorKind::Network(_) => AppError::BadGateway(message),
        ApiErrorKind::Unknown(_) => AppError::InternalError(anyhow::anyhow!(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_unauthorized_with_hint() {
        let err = api_error_to_app_error(ApiErrorKind::Unauthenticated("bad key".to_string()));

        match err {
            AppError::Unauthorized(e) => assert!(e.to_string().contains("billing")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn quota_failures_map_to_too_many_requests() {
        let err = api_error_to_app_error(ApiErrorKind::ResourceExhausted("quota".to_string()));

        assert!(matches!(
            err,
            AppError::TooManyRequests(_, Some(QUOTA_RETRY_AFTER_SECS))
        ));
    }

    #[test]
    fn network_failures_map_to_bad_gateway() {
        let err = api_error_to_app_error(ApiErrorKind::Network("reset".to_string()));

        assert!(matches!(err, AppError::BadGateway(_)));
    }
}
