use crate::cache::models::session::SessionField;

/// 会话字段缓存键前缀
const SESSION_PREFIX: &str = "session:";

/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成会话字段缓存键，形如 `session:{id}:{field}`
pub fn session_field_key(session_id: &str, field: SessionField) -> String {
    format!("{}{}:{}", SESSION_PREFIX, session_id, field.as_str())
}

pub fn rate_limit_key(client: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, client)
}
