use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::{SyncError, SyncPipeline};
use crate::classifier::EmailClassifier;
use crate::database::EmailRepository;
use crate::error::ExternalError;
use crate::gmail::MailProvider;
use crate::models::Email;
use crate::oauth::{OAuthCredentials, OAuthProvider};

/// 并发拉取邮件详情的上限
const FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub listed: usize,
    pub fetch_failed: usize,
    pub already_classified: usize,
    pub classified: usize,
    pub classify_failed: usize,
    /// 分类功能关闭时未分类的邮件数
    pub unclassified: usize,
    pub stored: u64,
    /// 被数据库拒绝、留待下次同步的邮件数
    pub store_rejected: usize,
}

/// 拉取 → 分类 → 写入
///
/// 单封邮件拉取或分类失败不会中断整批，已成功的部分照常写入，
/// 失败的邮件在下一次同步时重试。已有分类的邮件不会重复调用分类模型。
pub struct EmailSyncPipeline {
    provider: Arc<dyn MailProvider>,
    classifier: Option<Arc<dyn EmailClassifier>>,
    repository: Arc<dyn EmailRepository>,
    oauth: Arc<dyn OAuthProvider>,
    call_timeout: Duration,
}

/// 为单次外部调用加上超时
pub(crate) async fn bounded<T, F>(service: &'static str, limit: Duration, call: F) -> Result<T, ExternalError>
where
    F: Future<Output = Result<T, ExternalError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ExternalError::Timeout(service))?
}

impl EmailSyncPipeline {
    /// `classifier` 为空表示关闭付费分类调用
    pub fn new(
        provider: Arc<dyn MailProvider>,
        classifier: Option<Arc<dyn EmailClassifier>>,
        repository: Arc<dyn EmailRepository>,
        oauth: Arc<dyn OAuthProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            classifier,
            repository,
            oauth,
            call_timeout,
        }
    }

    pub async fn sync(&self, credential_payload: &str) -> Result<SyncReport, SyncError> {
        let credentials = OAuthCredentials::from_payload(credential_payload)?;
        let access_token = self.access_token(&credentials).await?;
        let account = credentials.account.as_str();

        let ids = bounded(
            "gmail list",
            self.call_timeout,
            self.provider.list_unread(&access_token),
        )
        .await?;

        let mut report = SyncReport {
            listed: ids.len(),
            ..SyncReport::default()
        };
        if ids.is_empty() {
            return Ok(report);
        }

        let fetched: Vec<Result<Email, (String, ExternalError)>> = stream::iter(ids)
            .map(|id| {
                let access_token = access_token.as_str();
                async move {
                    bounded(
                        "gmail fetch",
                        self.call_timeout,
                        self.provider.fetch_message(access_token, &id),
                    )
                    .await
                    .map_err(|e| (id, e))
                }
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut emails = Vec::with_capacity(fetched.len());
        for result in fetched {
            match result {
                Ok(email) => emails.push(email),
                Err((id, e)) => {
                    report.fetch_failed += 1;
                    warn!(message_id = %id, error = %e, "failed to fetch message, retrying next run");
                }
            }
        }

        let fetched_ids: Vec<String> = emails.iter().map(|e| e.gmail_id.clone()).collect();
        let classified = self.repository.classified_ids(account, &fetched_ids).await?;

        let now = Utc::now();
        for email in &mut emails {
            if classified.contains(&email.gmail_id) {
                report.already_classified += 1;
                continue;
            }
            let Some(classifier) = &self.classifier else {
                report.unclassified += 1;
                continue;
            };

            match bounded("classifier", self.call_timeout, classifier.analyze(email, now)).await {
                Ok(analysis) => {
                    email.priority = Some(analysis.priority());
                    report.classified += 1;
                }
                Err(e) => {
                    report.classify_failed += 1;
                    warn!(message_id = %email.gmail_id, error = %e, "failed to classify message, retrying next run");
                }
            }
        }

        let outcome = self.repository.upsert_emails(account, &emails).await?;
        report.stored = outcome.stored;
        report.store_rejected = outcome.rejected.len();
        Ok(report)
    }

    /// 令牌过期且有 refresh token 时先刷新
    async fn access_token(&self, credentials: &OAuthCredentials) -> Result<String, SyncError> {
        if !credentials.is_expired() {
            return Ok(credentials.access_token.clone());
        }

        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            warn!(account = %credentials.account, "access token expired and no refresh token available");
            return Ok(credentials.access_token.clone());
        };

        let grant = bounded(
            "oauth refresh",
            self.call_timeout,
            self.oauth.refresh(refresh_token),
        )
        .await?;
        Ok(grant.access_token)
    }
}

#[async_trait]
impl SyncPipeline for EmailSyncPipeline {
    async fn run(&self, credential_payload: String) {
        match self.sync(&credential_payload).await {
            Ok(report) => info!(
                listed = report.listed,
                classified = report.classified,
                skipped = report.already_classified,
                fetch_failed = report.fetch_failed,
                classify_failed = report.classify_failed,
                stored = report.stored,
                store_rejected = report.store_rejected,
                "email sync finished"
            ),
            Err(e) => error!(error = %e, "email sync abandoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::test::support::{
        FakeClassifier, FakeMailProvider, FakeOAuth, InMemoryEmailRepository, credentials_payload,
        sample_email,
    };

    const ACCOUNT: &str = "someone@gmail.com";

    struct Harness {
        provider: Arc<FakeMailProvider>,
        classifier: Arc<FakeClassifier>,
        repository: Arc<InMemoryEmailRepository>,
        oauth: Arc<FakeOAuth>,
    }

    impl Harness {
        fn new(emails: Vec<Email>) -> Self {
            Self {
                provider: Arc::new(FakeMailProvider::new(ACCOUNT, emails)),
                classifier: Arc::new(FakeClassifier::default()),
                repository: Arc::new(InMemoryEmailRepository::default()),
                oauth: Arc::new(FakeOAuth::default()),
            }
        }

        fn pipeline(&self, classify: bool) -> EmailSyncPipeline {
            let classifier: Option<Arc<dyn EmailClassifier>> = if classify {
                Some(self.classifier.clone())
            } else {
                None
            };
            EmailSyncPipeline::new(
                self.provider.clone(),
                classifier,
                self.repository.clone(),
                self.oauth.clone(),
                Duration::from_secs(5),
            )
        }
    }

    #[tokio::test]
    async fn one_bad_message_does_not_abort_the_batch() {
        let harness = Harness::new(vec![
            sample_email("m1", "Invoice overdue"),
            sample_email("m2", "Lunch?"),
            sample_email("m3", "Deploy tonight"),
        ]);
        harness.provider.fail_fetch("m2");
        harness.classifier.fail_on("Deploy tonight");

        let report = harness
            .pipeline(true)
            .sync(&credentials_payload(ACCOUNT))
            .await
            .unwrap();

        assert_eq!(report.listed, 3);
        assert_eq!(report.fetch_failed, 1);
        assert_eq!(report.classified, 1);
        assert_eq!(report.classify_failed, 1);

        let rows = harness.repository.rows(ACCOUNT);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows["m1"].priority, Some(Priority::High));
        assert_eq!(rows["m3"].priority, None);
    }

    #[tokio::test]
    async fn rejected_row_does_not_block_the_rest() {
        let harness = Harness::new(vec![
            sample_email("m1", "Invoice overdue"),
            sample_email("m2", "Lunch?"),
            sample_email("m3", "Deploy tonight"),
        ]);
        harness.repository.reject("m2");

        let report = harness
            .pipeline(true)
            .sync(&credentials_payload(ACCOUNT))
            .await
            .unwrap();

        assert_eq!(report.store_rejected, 1);
        assert_eq!(report.stored, 2);
        let rows = harness.repository.rows(ACCOUNT);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows["m1"].priority, Some(Priority::High));
        assert_eq!(rows["m3"].priority, Some(Priority::Medium));
        assert!(!rows.contains_key("m2"));
    }

    #[tokio::test]
    async fn rerun_skips_classified_and_keeps_priorities() {
        let harness = Harness::new(vec![
            sample_email("m1", "Invoice overdue"),
            sample_email("m2", "Weekly newsletter"),
        ]);
        let pipeline = harness.pipeline(true);
        let payload = credentials_payload(ACCOUNT);

        pipeline.sync(&payload).await.unwrap();
        let first = harness.repository.rows(ACCOUNT);
        assert_eq!(harness.classifier.calls(), 2);

        let report = pipeline.sync(&payload).await.unwrap();
        assert_eq!(report.already_classified, 2);
        assert_eq!(report.classified, 0);
        assert_eq!(harness.classifier.calls(), 2);
        assert_eq!(harness.repository.rows(ACCOUNT), first);
        assert_eq!(harness.repository.row_count(), 2);
    }

    #[tokio::test]
    async fn failed_classification_is_retried_next_run() {
        let harness = Harness::new(vec![sample_email("m1", "Deploy tonight")]);
        harness.classifier.fail_on("Deploy tonight");
        let pipeline = harness.pipeline(true);
        let payload = credentials_payload(ACCOUNT);

        pipeline.sync(&payload).await.unwrap();
        assert_eq!(harness.repository.rows(ACCOUNT)["m1"].priority, None);

        harness.classifier.clear_failures();
        let report = pipeline.sync(&payload).await.unwrap();
        assert_eq!(report.classified, 1);
        assert_eq!(
            harness.repository.rows(ACCOUNT)["m1"].priority,
            Some(Priority::Medium)
        );
    }

    #[tokio::test]
    async fn disabled_classifier_stores_unclassified() {
        let harness = Harness::new(vec![sample_email("m1", "Invoice overdue")]);
        let report = harness
            .pipeline(false)
            .sync(&credentials_payload(ACCOUNT))
            .await
            .unwrap();

        assert_eq!(report.unclassified, 1);
        assert_eq!(harness.classifier.calls(), 0);
        assert_eq!(harness.repository.rows(ACCOUNT)["m1"].priority, None);
    }

    #[tokio::test]
    async fn list_failure_aborts_without_writes() {
        let harness = Harness::new(vec![sample_email("m1", "Invoice overdue")]);
        harness.provider.fail_list();

        let result = harness
            .pipeline(true)
            .sync(&credentials_payload(ACCOUNT))
            .await;
        assert!(matches!(result, Err(SyncError::External(_))));
        assert_eq!(harness.repository.row_count(), 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let harness = Harness::new(vec![]);
        let result = harness.pipeline(true).sync("not json").await;
        assert!(matches!(result, Err(SyncError::Credentials(_))));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_listing() {
        let harness = Harness::new(vec![sample_email("m1", "Invoice overdue")]);
        let mut creds = OAuthCredentials::from_payload(&credentials_payload(ACCOUNT)).unwrap();
        creds.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));

        harness
            .pipeline(true)
            .sync(&creds.to_payload().unwrap())
            .await
            .unwrap();

        assert_eq!(harness.oauth.refreshes(), 1);
        assert_eq!(harness.provider.last_token().as_deref(), Some("refreshed-token"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_classifier_times_out_per_message() {
        let harness = Harness::new(vec![sample_email("m1", "Invoice overdue")]);
        harness.classifier.stall_on("Invoice overdue");

        let report = harness
            .pipeline(true)
            .sync(&credentials_payload(ACCOUNT))
            .await
            .unwrap();
        assert_eq!(report.classify_failed, 1);
        assert_eq!(harness.repository.row_count(), 1);
    }
}
