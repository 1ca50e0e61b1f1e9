use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 邮件优先级，对应数据库中的 `email_priority` 枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "email_priority", rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(UnknownPriority(other.to_string())),
        }
    }
}

/// 分类模型对单封邮件的分析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAnalysis {
    /// 邮件是否要求收件人执行某个操作
    pub action: bool,
    pub overdue: bool,
    /// 是否需要在一周内处理
    pub due_soon: bool,
    /// 紧急程度，取值 1..=10
    #[serde(rename = "urgent", alias = "urgency")]
    pub urgency: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl EmailAnalysis {
    pub const URGENCY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

    pub fn is_valid(&self) -> bool {
        Self::URGENCY_RANGE.contains(&self.urgency)
    }

    /// 逾期为高优先级；即将到期或紧急程度不低于 5 为中优先级；其余为低优先级
    pub fn priority(&self) -> Priority {
        if self.overdue {
            Priority::High
        } else if self.due_soon || self.urgency >= 5 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// 从邮件服务商拉取到的一封邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub gmail_id: String,
    pub link: String,
    pub time_sent: DateTime<Utc>,
    pub sent_from: String,
    pub subject: String,
    pub body: String,
    pub priority: Option<Priority>,
}

/// 已持久化的邮件，供优先级接口返回
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StoredEmail {
    pub gmail_id: String,
    pub link: String,
    pub subject: String,
    pub sent_from: String,
    pub time_sent: DateTime<Utc>,
    pub priority: Option<Priority>,
}

impl From<&Email> for StoredEmail {
    fn from(email: &Email) -> Self {
        Self {
            gmail_id: email.gmail_id.clone(),
            link: email.link.clone(),
            subject: email.subject.clone(),
            sent_from: email.sent_from.clone(),
            time_sent: email.time_sent,
            priority: email.priority,
        }
    }
}
