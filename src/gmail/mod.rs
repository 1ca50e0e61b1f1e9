//! 邮件服务商接入（Gmail）

mod body;
mod client;
mod model;

use async_trait::async_trait;

use crate::error::ExternalError;
use crate::models::Email;

pub use client::GmailClient;
pub use model::message_link;

/// 邮件服务商接口，所有调用都以 OAuth access token 代表用户访问
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// 授权账户的邮箱地址
    async fn account_address(&self, access_token: &str) -> Result<String, ExternalError>;

    /// 收件箱中未读邮件的 ID 列表
    async fn list_unread(&self, access_token: &str) -> Result<Vec<String>, ExternalError>;

    async fn fetch_message(&self, access_token: &str, id: &str) -> Result<Email, ExternalError>;
}
