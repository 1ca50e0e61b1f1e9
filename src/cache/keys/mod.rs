/// 缓存键模块
/// 提供各种缓存键生成函数
pub mod session_keys;

pub use session_keys::{rate_limit_key, session_field_key};
