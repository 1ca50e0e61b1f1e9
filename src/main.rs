use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use inbox_triage::{
    AppState,
    cache::RedisSessionStore,
    classifier::{EmailClassifier, OpenAiClassifier},
    config::Config,
    database::PgEmailRepository,
    gmail::GmailClient,
    middleware::{RateLimiter, rate_limit},
    oauth::{ClientSecret, GoogleOAuthClient},
    router::create_router,
    session::{CredentialVault, SignedCookieCodec, SyncDebouncer, SyncScheduler},
    sync::{EmailSyncPipeline, TaskRunner},
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，缺少必填项直接退出
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'inbox_triage';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    // 设置 Redis 会话存储
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let sessions = Arc::new(
        RedisSessionStore::connect(&redis_client)
            .await
            .expect("Failed to connect to Redis"),
    );

    // 外部服务
    let timeout = config.external_call_timeout();
    let secret = ClientSecret::from_file(&config.gmail_client_secret_filename)
        .expect("Failed to load OAuth client secret");
    let oauth = Arc::new(
        GoogleOAuthClient::new(secret, config.oauth_redirect_uri.clone(), timeout)
            .expect("Failed to create OAuth client"),
    );
    let provider = Arc::new(
        GmailClient::new(config.max_unread_messages, timeout).expect("Failed to create Gmail client"),
    );
    let classifier: Option<Arc<dyn EmailClassifier>> = match &config.openai_api_key {
        Some(api_key) if config.call_classifier_api => Some(Arc::new(
            OpenAiClassifier::new(api_key.clone(), config.classifier_model.clone(), timeout)
                .expect("Failed to create classifier client"),
        )),
        _ => {
            tracing::info!("Classifier calls disabled, emails will be stored unclassified");
            None
        }
    };
    let emails = Arc::new(PgEmailRepository::new(pool));

    // 同步调度
    let tasks = TaskRunner::new();
    let vault = CredentialVault::new(sessions.clone());
    let pipeline = Arc::new(EmailSyncPipeline::new(
        provider.clone(),
        classifier,
        emails.clone(),
        oauth.clone(),
        timeout,
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        vault.clone(),
        SyncDebouncer::new(sessions.clone(), config.sync_debounce()),
        pipeline,
        tasks.clone(),
    ));

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        codec: Arc::new(SignedCookieCodec::new(config.session_secret.clone())),
        sessions,
        vault,
        scheduler,
        oauth,
        provider,
        emails,
    };

    // 设置限流器
    let rate_limiter = Arc::new(
        RateLimiter::connect(&redis_client, &config)
            .await
            .expect("Failed to connect rate limiter to Redis"),
    );

    let app = create_router(state).layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit,
    ));

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // 等待后台同步结束，超过宽限期的任务被中止
    let abandoned = tasks.drain(config.shutdown_grace()).await;
    tracing::info!(abandoned, "Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
