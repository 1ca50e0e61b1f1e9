use std::sync::Arc;

use crate::cache::{SessionField, SessionStore};
use crate::error::AppError;

/// 会话中的 OAuth 凭据，所有需要访问邮件服务商的入口都经由这里鉴权
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn SessionStore>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// 保存凭据，重新授权时覆盖旧值
    pub async fn store(&self, session_id: &str, payload: &str) -> Result<(), AppError> {
        self.store
            .set_field(session_id, SessionField::Credentials, payload, None)
            .await
    }

    /// 字段不存在或为空时返回 `AppError::NotAuthenticated`
    pub async fn retrieve(&self, session_id: &str) -> Result<String, AppError> {
        match self
            .store
            .get_field(session_id, SessionField::Credentials)
            .await?
        {
            Some(payload) if !payload.is_empty() => Ok(payload),
            _ => Err(AppError::NotAuthenticated),
        }
    }
}
