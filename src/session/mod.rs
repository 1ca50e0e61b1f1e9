//! 会话绑定、OAuth 凭据保管与同步防抖

mod codec;
mod debounce;
mod scheduler;
mod vault;

pub use codec::SignedCookieCodec;
pub use debounce::SyncDebouncer;
pub use scheduler::{SyncScheduler, TriggerDecision};
pub use vault::CredentialVault;
