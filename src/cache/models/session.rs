/// 会话记录中的字段，每个字段在存储层拥有独立的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    /// 会话创建时间，标记会话记录存在
    CreatedAt,
    /// 序列化后的 OAuth 凭据，不过期
    Credentials,
    /// 同步防抖标记，按配置的窗口过期
    SyncDebounce,
    /// 登录流程中的 CSRF state，一次性使用
    OAuthState,
}

impl SessionField {
    pub const ALL: [SessionField; 4] = [
        SessionField::CreatedAt,
        SessionField::Credentials,
        SessionField::SyncDebounce,
        SessionField::OAuthState,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionField::CreatedAt => "created_at",
            SessionField::Credentials => "credentials",
            SessionField::SyncDebounce => "recently_synced",
            SessionField::OAuthState => "oauth_state",
        }
    }
}
