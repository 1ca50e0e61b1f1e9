//! Gmail API 响应结构

use chrono::DateTime;
use serde::Deserialize;

use super::body::extract_body;
use crate::error::ExternalError;
use crate::models::Email;

const SERVICE: &str = "gmail";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    /// 毫秒级 Unix 时间戳，API 以字符串返回
    pub internal_date: String,
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
}

impl MessagePart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

pub fn message_link(message_id: &str) -> String {
    format!("https://mail.google.com/mail/u/0/#all/{}", message_id)
}

/// Postgres 的文本类型不接受 NUL 字节
fn strip_nul(value: &str) -> String {
    value.replace('\0', "")
}

impl TryFrom<GmailMessage> for Email {
    type Error = ExternalError;

    fn try_from(message: GmailMessage) -> Result<Self, Self::Error> {
        let millis: i64 = message.internal_date.parse().map_err(|_| {
            ExternalError::InvalidResponse(
                SERVICE,
                format!("bad internalDate {:?} on {}", message.internal_date, message.id),
            )
        })?;
        let time_sent = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            ExternalError::InvalidResponse(SERVICE, format!("internalDate out of range on {}", message.id))
        })?;

        let sent_from = message
            .payload
            .header("From")
            .ok_or_else(|| {
                ExternalError::InvalidResponse(SERVICE, format!("missing From header on {}", message.id))
            })
            .map(strip_nul)?;
        let subject = strip_nul(message.payload.header("Subject").unwrap_or_default());
        let body = extract_body(&message.payload)
            .map(|body| strip_nul(&body))
            .unwrap_or_else(|| {
                tracing::debug!(message_id = %message.id, "no readable body part");
                String::new()
            });

        Ok(Email {
            link: strip_nul(&message_link(&message.id)),
            gmail_id: message.id,
            time_sent,
            sent_from,
            subject,
            body,
            priority: None,
        })
    }
}
