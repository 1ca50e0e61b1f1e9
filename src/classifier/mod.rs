//! 邮件优先级分类

mod openai;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ExternalError;
use crate::models::{Email, EmailAnalysis};

pub use openai::OpenAiClassifier;

#[async_trait]
pub trait EmailClassifier: Send + Sync {
    /// 分析单封邮件，`now` 用于判断是否逾期或即将到期
    async fn analyze(&self, email: &Email, now: DateTime<Utc>)
    -> Result<EmailAnalysis, ExternalError>;
}
