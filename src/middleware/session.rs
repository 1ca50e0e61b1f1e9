use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::AppState;

/// 从 Cookie 中解析出的会话 ID，签名无效或缺失时为 `None`
///
/// 提取本身不会拒绝请求，由各个处理函数决定跳转还是返回 401。
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<String>);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(&state.config.session_cookie_name)
            .and_then(|cookie| match state.codec.verify(cookie.value()) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::debug!("ignoring session cookie: {}", e);
                    None
                }
            });

        Ok(CurrentSession(session_id))
    }
}

/// 会话 Cookie 不设置过期时间，会话的生命周期由存储层决定
pub fn session_cookie(name: String, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
