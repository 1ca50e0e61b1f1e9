use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use url::Url;

use super::{ClientSecret, OAuthProvider, TokenGrant};
use crate::error::ExternalError;

const SERVICE: &str = "google oauth";

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

fn bearer() -> String {
    "Bearer".into()
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Google 授权码流程客户端
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    secret: ClientSecret,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl GoogleOAuthClient {
    /// `redirect_uri` 为空时使用密钥文件中的第一个回调地址
    pub fn new(
        secret: ClientSecret,
        redirect_uri: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExternalError> {
        let redirect_uri = redirect_uri
            .or_else(|| secret.redirect_uris.first().cloned())
            .ok_or_else(|| {
                ExternalError::InvalidResponse(SERVICE, "no redirect uri configured".into())
            })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Request(SERVICE, e.to_string()))?;

        Ok(Self {
            http,
            secret,
            redirect_uri,
            scopes: vec![GMAIL_READONLY_SCOPE.to_string()],
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ExternalError> {
        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => format!(
                    "{} ({})",
                    err.error,
                    err.error_description.unwrap_or_default()
                ),
                Err(_) => format!("status {}", status),
            };
            return Err(ExternalError::Request(SERVICE, message));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))?;

        let expires_at = token
            .expires_in
            .map(|secs| expiry_after(Utc::now(), secs))
            .transpose()?;

        Ok(TokenGrant {
            access_token: token.access_token,
            token_type: token.token_type,
            refresh_token: token.refresh_token,
            expires_at,
            scope: token.scope,
        })
    }
}

/// 超出时间范围的 `expires_in` 视为无效响应
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, ExternalError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            ExternalError::InvalidResponse(SERVICE, format!("expires_in out of range: {expires_in}"))
        })
}

fn request_error(e: &reqwest::Error) -> ExternalError {
    if e.is_timeout() {
        ExternalError::Timeout(SERVICE)
    } else {
        ExternalError::Request(SERVICE, e.to_string())
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> Result<Url, ExternalError> {
        let mut url = Url::parse(&self.secret.auth_uri)
            .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("client_id", self.secret.client_id.as_str())
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            // 需要 refresh token 供后台同步使用
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExternalError> {
        self.token_request(&[
            ("code", code),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ExternalError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}
