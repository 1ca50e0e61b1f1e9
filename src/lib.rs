use std::sync::Arc;

use config::Config;

pub mod cache;
pub mod classifier;
pub mod config;
pub mod database;
pub mod error;
pub mod gmail;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod result;
pub mod router;
pub mod routes;
pub mod session;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod test;

use cache::SessionStore;
use database::EmailRepository;
use gmail::MailProvider;
use oauth::OAuthProvider;
use session::{CredentialVault, SignedCookieCodec, SyncScheduler};

/// 应用上下文，启动时构造一次后在所有请求间共享
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub codec: Arc<SignedCookieCodec>,
    pub sessions: Arc<dyn SessionStore>,
    pub vault: CredentialVault,
    pub scheduler: Arc<SyncScheduler>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub provider: Arc<dyn MailProvider>,
    pub emails: Arc<dyn EmailRepository>,
}
