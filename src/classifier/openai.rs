use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::EmailClassifier;
use crate::error::ExternalError;
use crate::models::{Email, EmailAnalysis};

const SERVICE: &str = "openai";
const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// 邮件正文截断长度，避免超长邮件耗尽上下文
const MAX_BODY_CHARS: usize = 8_000;

const SYSTEM_PROMPT: &str = r#"Read the following email subject and message. Respond with a JSON object containing:
- "action": a boolean indicating if the email asks the user to perform an action
- "overdue": a boolean indicating whether the action is overdue
- "due_soon": a boolean indicating whether the action should be done in the upcoming week
- "urgent": a scale from 1 to 10 indicating how urgent the email is
- "explanation": an explanation for urgency score"#;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI chat completions 分类器
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ExternalError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Request(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

/// 形如 `3/7/2025 at 9:5:30`
fn prompt_timestamp(time: DateTime<Utc>) -> String {
    time.format("%-m/%-d/%Y at %-H:%-M:%-S").to_string()
}

fn user_prompt(email: &Email, now: DateTime<Utc>) -> String {
    let body: String = email.body.chars().take(MAX_BODY_CHARS).collect();
    format!(
        "Today the date/time is: {} Message sent: \"{}\" Subject: \"{}\" Message: \"{}\"",
        prompt_timestamp(now),
        prompt_timestamp(email.time_sent),
        email.subject,
        body
    )
}

fn parse_analysis(content: &str) -> Result<EmailAnalysis, ExternalError> {
    let analysis: EmailAnalysis = serde_json::from_str(content.trim())
        .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))?;
    if !analysis.is_valid() {
        return Err(ExternalError::InvalidResponse(
            SERVICE,
            format!("urgency {} outside 1..=10", analysis.urgency),
        ));
    }
    Ok(analysis)
}

#[async_trait]
impl EmailClassifier for OpenAiClassifier {
    async fn analyze(&self, email: &Email, now: DateTime<Utc>) -> Result<EmailAnalysis, ExternalError> {
        let request = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(email, now)},
            ],
        });

        let response = self
            .http
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExternalError::Timeout(SERVICE)
                } else {
                    ExternalError::Request(SERVICE, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalError::Request(SERVICE, format!("status {}", status)));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::InvalidResponse(SERVICE, e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExternalError::InvalidResponse(SERVICE, "empty completion".into()))?;

        parse_analysis(&content)
    }
}
