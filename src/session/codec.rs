use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// 会话 Cookie 签名与校验
///
/// Cookie 值为 `base64url(session_id) "." base64url(HMAC-SHA256(secret, session_id))`。
/// 更换密钥会让所有旧 Cookie 失效，访客退回到未登录状态。
#[derive(Clone)]
pub struct SignedCookieCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignedCookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedCookieCodec").finish_non_exhaustive()
    }
}

impl SignedCookieCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// 生成新的会话 ID 及其签名后的 Cookie 值
    pub fn issue(&self) -> (String, String) {
        let session_id = Uuid::new_v4().to_string();
        let cookie_value = self.sign(&session_id);
        (session_id, cookie_value)
    }

    pub fn sign(&self, session_id: &str) -> String {
        let tag = self.mac(session_id.as_bytes()).finalize().into_bytes();
        format!(
            "{}{}{}",
            URL_SAFE_NO_PAD.encode(session_id),
            SEPARATOR,
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    pub fn verify(&self, cookie_value: &str) -> Result<String, AppError> {
        let (encoded_id, encoded_tag) = cookie_value
            .split_once(SEPARATOR)
            .ok_or(AppError::InvalidSignature)?;

        let id_bytes = URL_SAFE_NO_PAD
            .decode(encoded_id)
            .map_err(|_| AppError::InvalidSignature)?;
        let tag = URL_SAFE_NO_PAD
            .decode(encoded_tag)
            .map_err(|_| AppError::InvalidSignature)?;

        // verify_slice 内部为常量时间比较
        self.mac(&id_bytes)
            .verify_slice(&tag)
            .map_err(|_| AppError::InvalidSignature)?;

        let session_id = String::from_utf8(id_bytes).map_err(|_| AppError::InvalidSignature)?;
        Uuid::parse_str(&session_id).map_err(|_| AppError::InvalidSignature)?;
        Ok(session_id)
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(message);
        mac
    }
}
