// 缓存模块
// 会话记录保存在 Redis 中，每个字段独立成键以便单独设置过期时间

pub mod keys;
pub mod models;
pub mod operations;

pub use models::session::SessionField;
pub use operations::session::{RedisSessionStore, SessionStore};
