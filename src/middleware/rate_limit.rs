use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::{AsyncCommands, aio::MultiplexedConnection};

use crate::{
    cache::keys::rate_limit_key,
    config::Config,
    error::AppError,
    utils::{error_codes, error_to_api_response},
};

/// 基于 Redis 的按 IP 固定窗口限流
#[derive(Clone)]
pub struct RateLimiter {
    conn: MultiplexedConnection,
    window_secs: u64,
    max_requests: u32,
}

impl RateLimiter {
    pub async fn connect(client: &redis::Client, config: &Config) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            window_secs: config.rate_limit_window().as_secs().max(1),
            max_requests: config.rate_limit_requests,
        })
    }

    async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let ip = client_ip(&req);
        let key = rate_limit_key(&ip);
        let mut conn = self.conn.clone();

        // INCR 与 EXPIRE 实现计数窗口，第一次计数时设置过期时间
        let count: u64 = match conn.incr(&key, 1).await {
            Ok(count) => count,
            Err(e) => return AppError::from(e).into_response(),
        };
        if count == 1 {
            let expire: redis::RedisResult<()> = conn.expire(&key, self.window_secs as i64).await;
            if let Err(e) = expire {
                return AppError::from(e).into_response();
            }
        }

        if count > u64::from(self.max_requests) {
            tracing::warn!(%ip, count, "rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                error_to_api_response::<()>(
                    error_codes::RATE_LIMIT,
                    format!("Too many requests, retry in {} seconds", self.window_secs),
                ),
            )
                .into_response();
        }

        next.run(req).await
    }
}

/// 优先使用反向代理写入的头部，其次使用连接地址
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
