use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::result::ApiResult;
use crate::utils::error_codes;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid session signature")]
    InvalidSignature,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),
    #[error("invalid oauth state")]
    InvalidOAuthState,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// 外部服务（邮件服务商、OAuth、分类模型）调用失败
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{0} request failed: {1}")]
    Request(&'static str, String),
    #[error("{0} returned an invalid response: {1}")]
    InvalidResponse(&'static str, String),
    #[error("{0} call timed out")]
    Timeout(&'static str),
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::InvalidSignature | AppError::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED)
            }
            AppError::InvalidPriority(_) | AppError::InvalidOAuthState | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
            }
            AppError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, error_codes::STORE_UNAVAILABLE)
            }
            AppError::External(_) => (StatusCode::BAD_GATEWAY, error_codes::UPSTREAM_ERROR),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 服务端错误不把内部细节暴露给客户端
        let error_message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            tracing::debug!(error = %self, "request rejected");
            self.to_string()
        };

        let body = Json(ApiResult::<()>::error(code, error_message));
        (status, body).into_response()
    }
}
