use std::sync::Arc;
use std::time::Duration;

use crate::cache::{SessionField, SessionStore};
use crate::error::AppError;

const FLAG_VALUE: &str = "1";

/// 按会话的同步防抖标记，标记由存储层按窗口自动过期
#[derive(Clone)]
pub struct SyncDebouncer {
    store: Arc<dyn SessionStore>,
    window: Duration,
}

impl SyncDebouncer {
    pub fn new(store: Arc<dyn SessionStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn mark_triggered(&self, session_id: &str) -> Result<(), AppError> {
        self.store
            .set_field(
                session_id,
                SessionField::SyncDebounce,
                FLAG_VALUE,
                Some(self.window),
            )
            .await
    }

    pub async fn is_eligible(&self, session_id: &str) -> Result<bool, AppError> {
        let flag = self
            .store
            .get_field(session_id, SessionField::SyncDebounce)
            .await?;
        Ok(flag.is_none())
    }

    /// 原子地检查并设置标记，返回 true 表示本次调用获得了同步资格
    pub async fn try_acquire(&self, session_id: &str) -> Result<bool, AppError> {
        self.store
            .set_field_if_absent(session_id, SessionField::SyncDebounce, FLAG_VALUE, self.window)
            .await
    }
}
