use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use super::{EmailRepository, UpsertOutcome};
use crate::models::{Email, Priority, StoredEmail};

/// Postgres 邮件存储
#[derive(Clone)]
pub struct PgEmailRepository {
    pool: PgPool,
}

impl PgEmailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailRepository for PgEmailRepository {
    async fn classified_ids(
        &self,
        account: &str,
        ids: &[String],
    ) -> Result<HashSet<String>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT gmail_id FROM emails
            WHERE account = $1 AND gmail_id = ANY($2) AND priority IS NOT NULL
            "#,
        )
        .bind(account)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn upsert_emails(
        &self,
        account: &str,
        emails: &[Email],
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let mut outcome = UpsertOutcome::default();

        // 每行单独提交，一行失败不回滚其他行
        for email in emails {
            let result = sqlx::query(
                r#"
                INSERT INTO emails (account, gmail_id, link, subject, sent_from, time_sent, priority)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (account, gmail_id)
                DO UPDATE SET priority = COALESCE(EXCLUDED.priority, emails.priority)
                "#,
            )
            .bind(account)
            .bind(&email.gmail_id)
            .bind(&email.link)
            .bind(&email.subject)
            .bind(&email.sent_from)
            .bind(email.time_sent)
            .bind(email.priority)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => outcome.stored += done.rows_affected(),
                Err(sqlx::Error::Database(e)) => {
                    warn!(message_id = %email.gmail_id, error = %e, "email row rejected by database");
                    outcome.rejected.push(email.gmail_id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    async fn list_by_priority(
        &self,
        account: &str,
        priority: Priority,
    ) -> Result<Vec<StoredEmail>, sqlx::Error> {
        sqlx::query_as::<_, StoredEmail>(
            r#"
            SELECT gmail_id, link, subject, sent_from, time_sent, priority
            FROM emails
            WHERE account = $1 AND priority = $2
            ORDER BY time_sent DESC
            "#,
        )
        .bind(account)
        .bind(priority)
        .fetch_all(&self.pool)
        .await
    }
}
