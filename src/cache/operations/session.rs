use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};

use crate::cache::keys::session_field_key;
use crate::cache::models::session::SessionField;
use crate::error::AppError;

/// 以会话 ID 为键的字段存储，字段可以各自设置过期时间
///
/// 存储层是跨请求和后台任务的唯一共享状态，所有写操作都是单字段写入。
/// 后端不可用时返回 `AppError::StoreUnavailable`，不做本地兜底缓存。
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 写入字段，`ttl` 为空时字段不过期
    async fn set_field(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AppError>;

    /// 仅当字段不存在时写入并设置过期时间，返回是否写入成功
    async fn set_field_if_absent(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError>;

    async fn get_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError>;

    /// 原子地读取并删除字段，同一个值只会被取走一次
    async fn take_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError>;

    /// 删除会话的全部字段
    async fn clear(&self, session_id: &str) -> Result<(), AppError>;
}

/// Redis 会话存储
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set_field(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = session_field_key(session_id, field);

        match ttl {
            Some(ttl) => {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async::<()>(&mut conn)
                    .await?
            }
            None => conn.set::<_, _, ()>(&key, value).await?,
        }

        Ok(())
    }

    async fn set_field_if_absent(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let key = session_field_key(session_id, field);

        // SET NX PX 原子地完成检查与写入，未写入时 Redis 返回 nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn get_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let key = session_field_key(session_id, field);
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn take_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let key = session_field_key(session_id, field);
        // GETDEL 需要 Redis 6.2 及以上
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn clear(&self, session_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = SessionField::ALL
            .iter()
            .map(|field| session_field_key(session_id, *field))
            .collect();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
