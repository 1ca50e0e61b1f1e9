// 数据库模块
// 邮件按账户与 Gmail 消息 ID 唯一存储

mod email;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::{Email, Priority, StoredEmail};

pub use email::PgEmailRepository;

/// 批量写入的结果，被数据库拒绝的行不影响其余行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub stored: u64,
    /// 被拒绝写入的邮件 ID
    pub rejected: Vec<String>,
}

#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// 返回 `ids` 中已有分类结果的邮件 ID
    async fn classified_ids(
        &self,
        account: &str,
        ids: &[String],
    ) -> Result<HashSet<String>, sqlx::Error>;

    /// 按 (account, gmail_id) 逐行写入，冲突时只更新优先级且不会用空值覆盖已有分类
    ///
    /// 单行被数据库拒绝时记入 `rejected` 并继续；连接类错误直接返回。
    async fn upsert_emails(
        &self,
        account: &str,
        emails: &[Email],
    ) -> Result<UpsertOutcome, sqlx::Error>;

    async fn list_by_priority(
        &self,
        account: &str,
        priority: Priority,
    ) -> Result<Vec<StoredEmail>, sqlx::Error>;
}
