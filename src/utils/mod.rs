use axum::Json;
use serde::Serialize;

use crate::result::ApiResult;

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResult<T>> {
    Json(ApiResult::success(data))
}

pub fn error_to_api_response<T: Serialize>(code: i32, msg: String) -> Json<ApiResult<T>> {
    Json(ApiResult::error(code, msg))
}

/// 日志中只保留会话 ID 前缀
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const AUTH_FAILED: i32 = 1002;
    pub const RATE_LIMIT: i32 = 1005;
    pub const STORE_UNAVAILABLE: i32 = 5001;
    pub const UPSTREAM_ERROR: i32 = 5002;
    pub const INTERNAL_ERROR: i32 = 5000;
}
