//! 后台邮件同步：拉取未读邮件、分类、写入数据库

mod pipeline;
mod runner;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ExternalError;

pub(crate) use pipeline::bounded;
pub use pipeline::{EmailSyncPipeline, SyncReport};
pub use runner::TaskRunner;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed credential payload: {0}")]
    Credentials(#[from] serde_json::Error),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// 由调度器以发后不管的方式提交到后台执行
#[async_trait]
pub trait SyncPipeline: Send + Sync {
    async fn run(&self, credential_payload: String);
}
