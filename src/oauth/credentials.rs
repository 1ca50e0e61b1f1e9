use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 令牌端点返回的授权结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// 保存在会话中的凭据，序列化为 JSON 后作为不透明的载荷存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// 授权账户的邮箱地址
    pub account: String,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl OAuthCredentials {
    pub fn from_grant(grant: TokenGrant, account: impl Into<String>) -> Self {
        Self {
            access_token: grant.access_token,
            token_type: grant.token_type,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
            scope: grant.scope,
            account: account.into(),
        }
    }

    /// 预留 60 秒余量判断是否过期
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + Duration::seconds(60) >= exp)
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
