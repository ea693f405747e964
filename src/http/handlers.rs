use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::AppState;
use crate::error::RagError;

pub const NO_MESSAGE: &str = "No message provided";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Failure returned from `/chat`, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidQuery(_) => ApiError::BadRequest(NO_MESSAGE.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// `POST /chat`
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = match payload {
        Ok(Json(ChatRequest { message: Some(m) })) if !m.trim().is_empty() => m,
        Ok(_) => return Err(ApiError::BadRequest(NO_MESSAGE.to_string())),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected chat body");
            return Err(ApiError::BadRequest(NO_MESSAGE.to_string()));
        }
    };

    match state.rag.answer(&message).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            if !matches!(e, RagError::InvalidQuery(_)) {
                error!(error = %e, "Chat request failed");
            }
            Err(e.into())
        }
    }
}
