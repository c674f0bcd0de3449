// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Handler failures, one variant per status the API can answer with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}

impl From<danmutv_core::Error> for AppError {
    fn from(err: danmutv_core::Error) -> Self {
        use danmutv_core::Error;

        match err {
            Error::NotFound(msg) => Self::NotFound(msg),
            Error::AlreadyExists(msg) => Self::Conflict(msg),
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "handler failed");
                Self::Internal("internal server error".to_string())
            }
        }
    }
}
