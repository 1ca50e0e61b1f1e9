use std::sync::Arc;

use tracing::{debug, info};

use super::{CredentialVault, SyncDebouncer};
use crate::error::AppError;
use crate::sync::{SyncPipeline, TaskRunner};
use crate::utils::short_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// 已提交后台同步
    Triggered,
    /// 防抖窗口内，本次不同步
    Suppressed,
    /// 会话中没有凭据
    Unauthenticated,
}

/// 决定一次请求是否触发后台同步
///
/// 先查凭据，未登录的访客不会占用防抖窗口；再用存储层的原子
/// set-if-absent 写入防抖标记，写入成功才提交同步任务。
/// 存储层不支持原子写入时，并发请求可能各自触发一次同步。
pub struct SyncScheduler {
    vault: CredentialVault,
    debouncer: SyncDebouncer,
    pipeline: Arc<dyn SyncPipeline>,
    tasks: TaskRunner,
}

impl SyncScheduler {
    pub fn new(
        vault: CredentialVault,
        debouncer: SyncDebouncer,
        pipeline: Arc<dyn SyncPipeline>,
        tasks: TaskRunner,
    ) -> Self {
        Self {
            vault,
            debouncer,
            pipeline,
            tasks,
        }
    }

    pub fn debouncer(&self) -> &SyncDebouncer {
        &self.debouncer
    }

    pub async fn maybe_trigger(&self, session_id: &str) -> Result<TriggerDecision, AppError> {
        let credentials = match self.vault.retrieve(session_id).await {
            Ok(credentials) => credentials,
            Err(AppError::NotAuthenticated) => return Ok(TriggerDecision::Unauthenticated),
            Err(e) => return Err(e),
        };

        if !self.debouncer.try_acquire(session_id).await? {
            debug!(session = short_id(session_id), "sync suppressed by debounce window");
            return Ok(TriggerDecision::Suppressed);
        }

        let pipeline = self.pipeline.clone();
        self.tasks.submit("email_sync", async move {
            pipeline.run(credentials).await;
        });

        info!(session = short_id(session_id), "email sync triggered");
        Ok(TriggerDecision::Triggered)
    }
}
