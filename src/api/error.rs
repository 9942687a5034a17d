use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::shared::DomainError;

// ============================================================================
// HTTP mapping of the domain failure taxonomy
// ============================================================================
//
// ReferenceResolutionFailed is a 502, never a 400: the caller's reference
// may be fine, we just could not check it.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(DomainError::invalid(message))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::InvalidInput { .. } | DomainError::ReferenceNotFound { .. } => StatusCode::BAD_REQUEST,
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::AlreadyInDesiredState { .. } | DomainError::PersistenceConflict { .. } => {
                StatusCode::CONFLICT
            }
            DomainError::ReferenceResolutionFailed { .. } => StatusCode::BAD_GATEWAY,
            DomainError::UnexpectedFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() && !matches!(self.0, DomainError::ReferenceResolutionFailed { .. }) {
            tracing::error!(error = %self.0, "Request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        HttpResponse::build(status).json(ErrorBody {
            code: self.0.code(),
            message,
        })
    }
}
