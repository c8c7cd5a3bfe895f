use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{response::ApiResponse, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store temporarily unavailable: {0}")]
    TransientStoreFailure(String),

    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error("Store error")]
    Store(#[source] StoreError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::TransientStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Inconsistent(_) => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Inconsistent(msg),
            StoreError::OutOfRange(msg) => AppError::InvalidArgument(msg),
            StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                AppError::TransientStoreFailure(err.to_string())
            }
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        (status, axum::Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn store_errors_map_to_stable_kinds() {
        let conflict: AppError = StoreError::Conflict("dup".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let timeout: AppError = StoreError::Timeout(Duration::from_millis(5)).into();
        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);

        let down: AppError = StoreError::Unavailable("conn reset".into()).into();
        assert!(matches!(down, AppError::TransientStoreFailure(_)));

        let overflow: AppError = StoreError::OutOfRange("quantity".into()).into();
        assert_eq!(overflow.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_cart_is_a_bad_request() {
        assert_eq!(AppError::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::EmptyCart.to_string(), "Cart is empty");
    }
}
