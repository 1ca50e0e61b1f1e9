use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::time::Instant;
use url::Url;

use crate::AppState;
use crate::cache::{SessionField, SessionStore};
use crate::classifier::EmailClassifier;
use crate::config::Config;
use crate::database::{EmailRepository, UpsertOutcome};
use crate::error::{AppError, ExternalError};
use crate::gmail::{MailProvider, message_link};
use crate::models::{Email, EmailAnalysis, Priority, StoredEmail};
use crate::oauth::{OAuthCredentials, OAuthProvider, TokenGrant};
use crate::session::{CredentialVault, SignedCookieCodec, SyncDebouncer, SyncScheduler};
use crate::sync::{EmailSyncPipeline, SyncPipeline, TaskRunner};

/// 内存会话存储，过期时间基于 tokio 时钟，可在暂停时钟的测试中推进
#[derive(Default)]
pub struct InMemorySessionStore {
    fields: Mutex<HashMap<(String, SessionField), (String, Option<Instant>)>>,
    unavailable: Mutex<bool>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟后端不可达
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check(&self) -> Result<(), AppError> {
        if *self.unavailable.lock().unwrap() {
            return Err(AppError::StoreUnavailable("connection refused".into()));
        }
        Ok(())
    }

    fn live_value(
        fields: &mut HashMap<(String, SessionField), (String, Option<Instant>)>,
        key: &(String, SessionField),
    ) -> Option<String> {
        let expired = match fields.get(key) {
            None => return None,
            Some((_, expires_at)) => expires_at.is_some_and(|at| Instant::now() >= at),
        };
        if expired {
            fields.remove(key);
            return None;
        }
        fields.get(key).map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set_field(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        self.check()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.fields
            .lock()
            .unwrap()
            .insert((session_id.to_string(), field), (value.to_string(), expires_at));
        Ok(())
    }

    async fn set_field_if_absent(
        &self,
        session_id: &str,
        field: SessionField,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        self.check()?;
        let mut fields = self.fields.lock().unwrap();
        let key = (session_id.to_string(), field);
        if Self::live_value(&mut fields, &key).is_some() {
            return Ok(false);
        }
        fields.insert(key, (value.to_string(), Some(Instant::now() + ttl)));
        Ok(true)
    }

    async fn get_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError> {
        self.check()?;
        let mut fields = self.fields.lock().unwrap();
        Ok(Self::live_value(
            &mut fields,
            &(session_id.to_string(), field),
        ))
    }

    async fn take_field(
        &self,
        session_id: &str,
        field: SessionField,
    ) -> Result<Option<String>, AppError> {
        self.check()?;
        let mut fields = self.fields.lock().unwrap();
        let key = (session_id.to_string(), field);
        let value = Self::live_value(&mut fields, &key);
        fields.remove(&key);
        Ok(value)
    }

    async fn clear(&self, session_id: &str) -> Result<(), AppError> {
        self.check()?;
        self.fields
            .lock()
            .unwrap()
            .retain(|(id, _), _| id != session_id);
        Ok(())
    }
}

/// 只记录收到的凭据载荷
#[derive(Default)]
pub struct CountingPipeline {
    payloads: Mutex<Vec<String>>,
}

impl CountingPipeline {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncPipeline for CountingPipeline {
    async fn run(&self, credential_payload: String) {
        self.payloads.lock().unwrap().push(credential_payload);
    }
}

pub fn sample_email(id: &str, subject: &str) -> Email {
    Email {
        gmail_id: id.to_string(),
        link: message_link(id),
        time_sent: Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap(),
        sent_from: "Billing <billing@example.com>".to_string(),
        subject: subject.to_string(),
        body: format!("Body of {subject}"),
        priority: None,
    }
}

pub fn credentials_payload(account: &str) -> String {
    let grant = TokenGrant {
        access_token: "access-token".into(),
        token_type: "Bearer".into(),
        refresh_token: Some("refresh-token".into()),
        expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        scope: None,
    };
    OAuthCredentials::from_grant(grant, account)
        .to_payload()
        .unwrap()
}

#[derive(Default)]
struct MailState {
    failing_fetches: HashSet<String>,
    fail_list: bool,
    last_token: Option<String>,
}

pub struct FakeMailProvider {
    account: String,
    emails: Vec<Email>,
    state: Mutex<MailState>,
}

impl FakeMailProvider {
    pub fn new(account: &str, emails: Vec<Email>) -> Self {
        Self {
            account: account.to_string(),
            emails,
            state: Mutex::new(MailState::default()),
        }
    }

    pub fn fail_fetch(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_fetches
            .insert(id.to_string());
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn last_token(&self) -> Option<String> {
        self.state.lock().unwrap().last_token.clone()
    }
}

#[async_trait]
impl MailProvider for FakeMailProvider {
    async fn account_address(&self, _access_token: &str) -> Result<String, ExternalError> {
        Ok(self.account.clone())
    }

    async fn list_unread(&self, access_token: &str) -> Result<Vec<String>, ExternalError> {
        let mut state = self.state.lock().unwrap();
        state.last_token = Some(access_token.to_string());
        if state.fail_list {
            return Err(ExternalError::Request("gmail", "503 Service Unavailable".into()));
        }
        Ok(self.emails.iter().map(|e| e.gmail_id.clone()).collect())
    }

    async fn fetch_message(&self, _access_token: &str, id: &str) -> Result<Email, ExternalError> {
        if self.state.lock().unwrap().failing_fetches.contains(id) {
            return Err(ExternalError::Request("gmail", format!("message {id} unavailable")));
        }
        self.emails
            .iter()
            .find(|e| e.gmail_id == id)
            .cloned()
            .ok_or_else(|| ExternalError::InvalidResponse("gmail", format!("unknown message {id}")))
    }
}

/// 按主题关键字给出分析结果：
/// "overdue" 为逾期，"tonight" 为即将到期，其余为低紧急度
#[derive(Default)]
pub struct FakeClassifier {
    failing: Mutex<HashSet<String>>,
    stalling: Mutex<HashSet<String>>,
    calls: Mutex<usize>,
}

impl FakeClassifier {
    pub fn fail_on(&self, subject: &str) {
        self.failing.lock().unwrap().insert(subject.to_string());
    }

    pub fn stall_on(&self, subject: &str) {
        self.stalling.lock().unwrap().insert(subject.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
        self.stalling.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl EmailClassifier for FakeClassifier {
    async fn analyze(
        &self,
        email: &Email,
        _now: DateTime<Utc>,
    ) -> Result<EmailAnalysis, ExternalError> {
        *self.calls.lock().unwrap() += 1;

        if self.failing.lock().unwrap().contains(&email.subject) {
            return Err(ExternalError::InvalidResponse(
                "classifier",
                "urgency out of range".into(),
            ));
        }
        let stall = self.stalling.lock().unwrap().contains(&email.subject);
        if stall {
            std::future::pending::<()>().await;
        }

        let subject = email.subject.to_lowercase();
        Ok(EmailAnalysis {
            action: true,
            overdue: subject.contains("overdue"),
            due_soon: subject.contains("tonight"),
            urgency: 2,
            explanation: None,
        })
    }
}

/// 与数据库一致的写入语义：冲突时只更新优先级，空值不覆盖已有分类
#[derive(Default)]
pub struct InMemoryEmailRepository {
    rows: Mutex<HashMap<(String, String), StoredEmail>>,
    rejected: Mutex<HashSet<String>>,
}

impl InMemoryEmailRepository {
    pub fn rows(&self, account: &str) -> HashMap<String, StoredEmail> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| owner == account)
            .map(|((_, id), row)| (id.clone(), row.clone()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// 模拟数据库拒绝某一行
    pub fn reject(&self, gmail_id: &str) {
        self.rejected.lock().unwrap().insert(gmail_id.to_string());
    }
}

#[async_trait]
impl EmailRepository for InMemoryEmailRepository {
    async fn classified_ids(
        &self,
        account: &str,
        ids: &[String],
    ) -> Result<HashSet<String>, sqlx::Error> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| {
                rows.get(&(account.to_string(), id.to_string()))
                    .is_some_and(|row| row.priority.is_some())
            })
            .cloned()
            .collect())
    }

    async fn upsert_emails(
        &self,
        account: &str,
        emails: &[Email],
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let rejected = self.rejected.lock().unwrap();
        let mut rows = self.rows.lock().unwrap();
        let mut outcome = UpsertOutcome::default();

        for email in emails {
            if rejected.contains(&email.gmail_id) {
                outcome.rejected.push(email.gmail_id.clone());
                continue;
            }
            let key = (account.to_string(), email.gmail_id.clone());
            match rows.get_mut(&key) {
                Some(row) => row.priority = email.priority.or(row.priority),
                None => {
                    rows.insert(key, StoredEmail::from(email));
                }
            }
            outcome.stored += 1;
        }
        Ok(outcome)
    }

    async fn list_by_priority(
        &self,
        account: &str,
        priority: Priority,
    ) -> Result<Vec<StoredEmail>, sqlx::Error> {
        let mut matching: Vec<StoredEmail> = self
            .rows(account)
            .into_values()
            .filter(|row| row.priority == Some(priority))
            .collect();
        matching.sort_by(|a, b| b.time_sent.cmp(&a.time_sent));
        Ok(matching)
    }
}

/// 授权码 `code` 换得的 access token 为 `access-{code}`
#[derive(Default)]
pub struct FakeOAuth {
    refreshes: Mutex<usize>,
}

impl FakeOAuth {
    pub fn refreshes(&self) -> usize {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorization_url(&self, state: &str) -> Result<Url, ExternalError> {
        let mut url = Url::parse("https://accounts.example.test/o/oauth2/auth")
            .map_err(|e| ExternalError::InvalidResponse("oauth", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", "test-client")
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExternalError> {
        Ok(TokenGrant {
            access_token: format!("access-{code}"),
            token_type: "Bearer".into(),
            refresh_token: Some("refresh-token".into()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scope: None,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ExternalError> {
        *self.refreshes.lock().unwrap() += 1;
        Ok(TokenGrant {
            access_token: "refreshed-token".into(),
            token_type: "Bearer".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scope: None,
        })
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/inbox_test"),
        ("REDIS_URL", "redis://localhost"),
        ("SESSION_SECRET", "test-secret-that-is-at-least-32-bytes"),
        ("GMAIL_API_CLIENT_SECRET_FILENAME", "client_secret.json"),
    ]);
    Config::from_vars(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

/// 由内存实现组装的应用上下文
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemorySessionStore>,
    pub provider: Arc<FakeMailProvider>,
    pub repository: Arc<InMemoryEmailRepository>,
    pub oauth: Arc<FakeOAuth>,
    pub tasks: TaskRunner,
}

impl TestApp {
    /// `pipeline` 为空时使用真实的同步流程与假的外部服务
    pub fn new(account: &str, emails: Vec<Email>, pipeline: Option<Arc<dyn SyncPipeline>>) -> Self {
        let config = test_config();
        let store = Arc::new(InMemorySessionStore::new());
        let provider = Arc::new(FakeMailProvider::new(account, emails));
        let repository = Arc::new(InMemoryEmailRepository::default());
        let oauth = Arc::new(FakeOAuth::default());
        let tasks = TaskRunner::new();
        let vault = CredentialVault::new(store.clone());

        let pipeline: Arc<dyn SyncPipeline> = match pipeline {
            Some(pipeline) => pipeline,
            None => {
                let classifier: Arc<dyn EmailClassifier> = Arc::new(FakeClassifier::default());
                Arc::new(EmailSyncPipeline::new(
                    provider.clone(),
                    Some(classifier),
                    repository.clone(),
                    oauth.clone(),
                    config.external_call_timeout(),
                ))
            }
        };
        let scheduler = Arc::new(SyncScheduler::new(
            vault.clone(),
            SyncDebouncer::new(store.clone(), config.sync_debounce()),
            pipeline,
            tasks.clone(),
        ));

        let state = AppState {
            codec: Arc::new(SignedCookieCodec::new(config.session_secret.clone())),
            config,
            sessions: store.clone(),
            vault,
            scheduler,
            oauth: oauth.clone(),
            provider: provider.clone(),
            emails: repository.clone(),
        };

        Self {
            state,
            store,
            provider,
            repository,
            oauth,
            tasks,
        }
    }
}
