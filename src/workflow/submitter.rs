//! Answer submission
//!
//! One POST per step. Every failure (network, non-2xx, undecodable body) is
//! folded into `SubmissionResult::error` and carries no continuation URL.

use crate::error::sanitize_error_message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON body posted to the submission endpoint
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub email: String,
    pub secret: String,
    pub url: String,
    pub answer: String,
}

impl std::fmt::Debug for SubmissionPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionPayload")
            .field("email", &self.email)
            .field("secret", &"***")
            .field("url", &self.url)
            .field("answer", &self.answer)
            .finish()
    }
}

/// Parsed submission response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResult {
    /// Build a result from a decoded response body
    ///
    /// Only `continuation_field` is consulted; a missing, empty or non-string
    /// value means there is no next page.
    pub fn from_body(raw: Value, continuation_field: &str) -> Self {
        let next_url = raw
            .get(continuation_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Self {
            next_url,
            raw,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            next_url: None,
            raw: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Continuation target, if the run should go on
    pub fn continuation(&self) -> Option<&str> {
        self.next_url.as_deref()
    }
}

/// Posts an answer and reports what the server said
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit(&self, endpoint: &str, payload: &SubmissionPayload) -> SubmissionResult;
}

/// reqwest-backed submitter
pub struct HttpSubmitter {
    client: Client,
    continuation_field: String,
}

impl HttpSubmitter {
    pub fn new(
        timeout: Duration,
        continuation_field: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            continuation_field: continuation_field.into(),
        })
    }
}

#[async_trait]
impl AnswerSubmitter for HttpSubmitter {
    async fn submit(&self, endpoint: &str, payload: &SubmissionPayload) -> SubmissionResult {
        debug!(endpoint = %endpoint, answer_len = payload.answer.len(), "Submitting answer");

        let response = match self.client.post(endpoint).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %endpoint, "Submission request failed: {}", e);
                return SubmissionResult::failed(sanitize_error_message(&e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %endpoint, status = status.as_u16(), "Submission rejected");
            return SubmissionResult::failed(sanitize_error_message(&format!(
                "Submission failed: HTTP {status} - {body}"
            )));
        }

        match response.json::<Value>().await {
            Ok(body) => SubmissionResult::from_body(body, &self.continuation_field),
            Err(e) => {
                warn!(endpoint = %endpoint, "Submission response was not JSON: {}", e);
                SubmissionResult::failed(format!(
                    "Invalid submission response: {}",
                    e.without_url()
                ))
            }
        }
    }
}
