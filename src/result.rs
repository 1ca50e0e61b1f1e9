use serde::{Deserialize, Serialize};

use crate::utils::error_codes;

/// JSON 接口统一的响应外壳
///
/// 成功时 `code` 为 `error_codes::SUCCESS` 且带 `content`，
/// 失败时带 `error_codes` 中的错误码和 `error_message`。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResult<T: Serialize> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<T>,
}

impl<T: Serialize> ApiResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            error_message: None,
            content: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            error_message: Some(message.into()),
            content: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == error_codes::SUCCESS
    }
}
