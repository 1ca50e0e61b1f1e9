//! OAuth 授权码流程：跳转授权页、回调换取令牌、后台刷新令牌

mod credentials;
mod google;
mod secret;

use async_trait::async_trait;
use url::Url;

use crate::error::ExternalError;

pub use credentials::{OAuthCredentials, TokenGrant};
pub use google::{GMAIL_READONLY_SCOPE, GoogleOAuthClient};
pub use secret::ClientSecret;

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// 构造授权页地址，`state` 用于回调时的 CSRF 校验
    fn authorization_url(&self, state: &str) -> Result<Url, ExternalError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExternalError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ExternalError>;
}
