use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::MailProvider;
use super::model::{GmailMessage, ListMessagesResponse, Profile};
use crate::error::ExternalError;
use crate::models::Email;

const SERVICE: &str = "gmail";

/// 只取收件箱“主要”分类中的邮件
const INBOX_QUERY: &str = "in:inbox -category:social -category:promotions";

/// Gmail REST API 客户端
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    max_results: u32,
}

impl GmailClient {
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    pub fn new(max_results: u32, timeout: Duration) -> Result<Self, ExternalError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Request(SERVICE, e.to_string()))?;

        Ok(Self {
            http,
            base_url: Self::BASE_URL.to_string(),
            max_results: max_results.clamp(1, 500),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ExternalError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExternalError::Timeout(SERVICE)
                } else {
                    ExternalError::Request(SERVICE, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalError::Request(
                SERVICE,
                format!("{} returned status {}", path, status),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn account_address(&self, access_token: &str) -> Result<String, ExternalError> {
        let profile: Profile = self
            .get_json(access_token, "/users/me/profile", &[])
            .await?;
        Ok(profile.email_address)
    }

    async fn list_unread(&self, access_token: &str) -> Result<Vec<String>, ExternalError> {
        let max_results = self.max_results.to_string();
        let list: ListMessagesResponse = self
            .get_json(
                access_token,
                "/users/me/messages",
                &[
                    ("labelIds", "UNREAD"),
                    ("q", INBOX_QUERY),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch_message(&self, access_token: &str, id: &str) -> Result<Email, ExternalError> {
        let message: GmailMessage = self
            .get_json(
                access_token,
                &format!("/users/me/messages/{}", id),
                &[("format", "full")],
            )
            .await?;
        Email::try_from(message)
    }
}
