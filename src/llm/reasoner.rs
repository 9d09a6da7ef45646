//! Prompt-to-answer reasoning
//!
//! `AnswerReasoner::ask` never fails: missing credentials, backend failures and
//! empty completions all come back as answer strings prefixed with `error: `.
//! Callers forward those strings like any other answer.

use crate::error::{sanitize_error_message, ERROR_ANSWER_PREFIX};
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*```(?:json)?").expect("valid fence pattern"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*$").expect("valid fence pattern"));

/// Turns a prompt into a short textual answer
#[async_trait]
pub trait AnswerReasoner: Send + Sync {
    async fn ask(&self, prompt: &str) -> String;
}

/// Reasoner backed by an `LlmProvider`
pub struct LlmReasoner {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmReasoner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: Some(0.0),
            max_tokens: Some(1500),
        }
    }

    /// Reasoner with no backend; every answer reports the missing key
    pub fn unconfigured() -> Self {
        Self {
            provider: None,
            model: String::new(),
            system_prompt: String::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                Message::system(self.system_prompt.clone()),
                Message::user(prompt),
            ],
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            metadata: HashMap::new(),
        }
    }
}

#[async_trait]
impl AnswerReasoner for LlmReasoner {
    async fn ask(&self, prompt: &str) -> String {
        let Some(provider) = &self.provider else {
            return format!("{ERROR_ANSWER_PREFIX}Missing API key");
        };

        debug!(prompt_len = prompt.len(), model = %self.model, "Asking reasoner");

        match provider.complete(self.build_request(prompt)).await {
            Ok(response) => {
                let cleaned = response
                    .content
                    .as_deref()
                    .map(strip_code_fences)
                    .unwrap_or_default();

                if cleaned.is_empty() {
                    warn!("Reasoner returned empty content");
                    format!("{ERROR_ANSWER_PREFIX}reasoner returned empty result")
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!("Reasoner call failed: {}", e);
                format!("{ERROR_ANSWER_PREFIX}{}", sanitize_error_message(&e.to_string()))
            }
        }
    }
}

/// Remove a leading ```json / ``` fence and a trailing ``` fence
pub fn strip_code_fences(output: &str) -> String {
    let without_leading = LEADING_FENCE.replace(output, "");
    TRAILING_FENCE
        .replace(&without_leading, "")
        .trim()
        .to_string()
}
