use std::path::Path;

use serde::Deserialize;

use crate::error::ExternalError;

const SERVICE: &str = "client secret file";

/// Google 控制台下载的 OAuth 客户端密钥
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretFile {
    Web(ClientSecret),
    Installed(ClientSecret),
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".into()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

impl ClientSecret {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExternalError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ExternalError::Request(SERVICE, format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// 兼容 `{"web": {...}}` 与 `{"installed": {...}}` 两种格式
    pub fn from_json(raw: &str) -> Result<Self, ExternalError> {
        let file: ClientSecretFile = serde_json::from_str(raw)
            .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))?;
        Ok(match file {
            ClientSecretFile::Web(secret) | ClientSecretFile::Installed(secret) => secret,
        })
    }
}
