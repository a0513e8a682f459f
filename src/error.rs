use crate::ports::store::StoreError;
use crate::push::DispatchError;
use crate::types::notification::NotificationId;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("notification {0} not found")]
    NotFound(NotificationId),

    #[error("unauthorized")]
    Unauthorized,

    #[error("role '{requested}' is not available to this caller")]
    Forbidden { requested: String },

    #[error("Push notifications are not configured.")]
    PushDisabled,

    #[error("storage failure: {0}")]
    Infrastructure(#[from] StoreError),

    #[error("push fan-out failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::PushDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infrastructure(_) | AppError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Infrastructure(_) | AppError::Dispatch(_) => {
                error!("request failed: {self}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
