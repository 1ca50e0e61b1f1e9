use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub session_secret: String,
    pub session_cookie_name: String,
    pub sync_debounce_secs: u64,
    pub oauth_state_ttl_secs: u64,
    pub gmail_client_secret_filename: String,
    pub oauth_redirect_uri: Option<String>,
    pub call_classifier_api: bool,
    pub openai_api_key: Option<String>,
    pub classifier_model: String,
    pub external_call_timeout_secs: u64,
    pub max_unread_messages: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，必填项缺失或取值无法解析都会直接失败
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let call_classifier_api = vars.parse_or("CALL_CLASSIFIER_API", false)?;
        let openai_api_key = vars.optional("OPENAI_API_KEY");
        if call_classifier_api && openai_api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }

        let session_secret = vars.required("SESSION_SECRET")?;
        if session_secret.len() < 32 {
            tracing::warn!("SESSION_SECRET is shorter than 32 bytes");
        }

        Ok(Config {
            database_url: vars.required("DATABASE_URL")?,
            redis_url: vars.required("REDIS_URL")?,
            server_host: vars.optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: vars.parse_or("SERVER_PORT", 3000)?,
            session_secret,
            session_cookie_name: vars
                .optional("SESSION_COOKIE_NAME")
                .unwrap_or_else(|| "session_id".into()),
            sync_debounce_secs: vars.parse_or("SYNC_DEBOUNCE_SECS", 300)?,
            oauth_state_ttl_secs: vars.parse_or("OAUTH_STATE_TTL_SECS", 600)?,
            gmail_client_secret_filename: vars.required("GMAIL_API_CLIENT_SECRET_FILENAME")?,
            oauth_redirect_uri: vars.optional("OAUTH_REDIRECT_URI"),
            call_classifier_api,
            openai_api_key,
            classifier_model: vars
                .optional("CLASSIFIER_MODEL")
                .unwrap_or_else(|| "gpt-4.1-nano".into()),
            external_call_timeout_secs: vars.parse_or("EXTERNAL_CALL_TIMEOUT_SECS", 30)?,
            max_unread_messages: vars.parse_or("MAX_UNREAD_MESSAGES", 25)?,
            rate_limit_window_secs: vars.parse_or("RATE_LIMIT_WINDOW", 60)?,
            rate_limit_requests: vars.parse_or("RATE_LIMIT_REQUESTS", 100)?,
            shutdown_grace_secs: vars.parse_or("SHUTDOWN_GRACE_SECS", 10)?,
        })
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_secs(self.sync_debounce_secs)
    }

    pub fn oauth_state_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_state_ttl_secs)
    }

    pub fn external_call_timeout(&self) -> Duration {
        Duration::from_secs(self.external_call_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .to_ascii_lowercase()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }
}
