//! Mock implementations for testing
//!
//! Test doubles for every collaborator seam of the workflow: renderer,
//! reasoner, document extractor, submitter and LLM provider. Each one records
//! what it was asked so tests can assert on call order and arguments.

use crate::extract::{DocumentExtractor, ExtractError};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::llm::AnswerReasoner;
use crate::render::{PageRenderer, RenderError, RenderedPage};
use crate::workflow::{AnswerSubmitter, SubmissionPayload, SubmissionResult};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type RecordedSubmission = (String, SubmissionPayload);

/// Submission response that continues to `next_url`
pub fn continue_to(next_url: &str) -> SubmissionResult {
    SubmissionResult::from_body(json!({"correct": true, "nextUrl": next_url}), "nextUrl")
}

/// Submission response that ends the run
pub fn finished() -> SubmissionResult {
    SubmissionResult::from_body(json!({"correct": true}), "nextUrl")
}

/// Mock renderer serving canned pages by URL
#[derive(Debug, Default)]
pub struct MockRenderer {
    pub pages: HashMap<String, RenderedPage>,
    pub failures: HashMap<String, u16>,
    pub rendered: Arc<Mutex<Vec<String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `markup` (and its derived text) for `url`
    pub fn with_page(mut self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.pages
            .insert(url.into(), RenderedPage::from_markup(markup));
        self
    }

    /// Fail rendering of `url` with the given backend status
    pub fn with_failure(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failures.insert(url.into(), status);
        self
    }

    /// Shared handle on the list of rendered URLs
    pub fn rendered_urls(&self) -> Arc<Mutex<Vec<String>>> {
        self.rendered.clone()
    }

    pub async fn get_rendered_urls(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.rendered.lock().await.push(url.to_string());

        if let Some(status) = self.failures.get(url) {
            return Err(RenderError::BackendStatus { status: *status });
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or(RenderError::BackendStatus { status: 404 })
    }
}

/// Mock reasoner returning scripted answers in order, cycling at the end
#[derive(Debug, Default)]
pub struct MockReasoner {
    pub answers: Vec<String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockReasoner {
    pub fn new(answers: Vec<String>) -> Self {
        Self {
            answers,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fixed(answer: impl Into<String>) -> Self {
        Self::new(vec![answer.into()])
    }

    pub async fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl AnswerReasoner for MockReasoner {
    async fn ask(&self, prompt: &str) -> String {
        let mut prompts = self.prompts.lock().await;
        let index = prompts.len();
        prompts.push(prompt.to_string());

        if self.answers.is_empty() {
            "Mock answer".to_string()
        } else {
            self.answers[index % self.answers.len()].clone()
        }
    }
}

/// Mock document extractor with canned PDF text and CSV rows
#[derive(Debug, Default)]
pub struct MockExtractor {
    pub pdfs: HashMap<String, String>,
    pub csvs: HashMap<String, Vec<Vec<String>>>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdf(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pdfs.insert(url.into(), text.into());
        self
    }

    pub fn with_csv(mut self, url: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        self.csvs.insert(url.into(), rows);
        self
    }

    pub async fn get_requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    fn not_found(url: &str) -> ExtractError {
        ExtractError::HttpStatus {
            url: url.to_string(),
            status: 404,
        }
    }
}

#[async_trait]
impl DocumentExtractor for MockExtractor {
    async fn pdf_text(&self, url: &str) -> Result<String, ExtractError> {
        self.requests.lock().await.push(url.to_string());
        self.pdfs.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }

    async fn csv_rows(&self, url: &str) -> Result<Vec<Vec<String>>, ExtractError> {
        self.requests.lock().await.push(url.to_string());
        self.csvs.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}

/// Mock submitter returning scripted results
///
/// Results are handed out in order; once exhausted, `fallback` is repeated.
#[derive(Debug)]
pub struct MockSubmitter {
    pub results: Vec<SubmissionResult>,
    pub fallback: SubmissionResult,
    pub submissions: Arc<Mutex<Vec<RecordedSubmission>>>,
}

impl MockSubmitter {
    pub fn new(results: Vec<SubmissionResult>) -> Self {
        Self {
            results,
            fallback: finished(),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every submission returns `result`
    pub fn always(result: SubmissionResult) -> Self {
        Self {
            fallback: result,
            ..Self::new(Vec::new())
        }
    }

    pub async fn get_submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl AnswerSubmitter for MockSubmitter {
    async fn submit(&self, endpoint: &str, payload: &SubmissionPayload) -> SubmissionResult {
        let mut submissions = self.submissions.lock().await;
        let index = submissions.len();
        submissions.push((endpoint.to_string(), payload.clone()));

        self.results
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Mock LLM provider for testing
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut requests = self.requests.lock().await;
        let index = requests.len();
        requests.push(request);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[index % self.responses.len()].clone()
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_renderer_serves_and_records() {
        let renderer = MockRenderer::new()
            .with_page("https://q.example/1", "<p>one</p>")
            .with_failure("https://q.example/down", 502);

        let page = renderer.render("https://q.example/1").await.unwrap();
        assert_eq!(page.plain_text, "one");

        assert!(matches!(
            renderer.render("https://q.example/down").await,
            Err(RenderError::BackendStatus { status: 502 })
        ));
        assert!(matches!(
            renderer.render("https://q.example/unknown").await,
            Err(RenderError::BackendStatus { status: 404 })
        ));

        assert_eq!(renderer.get_rendered_urls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_mock_reasoner_cycles_answers() {
        let reasoner = MockReasoner::new(vec!["a".to_string(), "b".to_string()]);

        assert_eq!(reasoner.ask("1").await, "a");
        assert_eq!(reasoner.ask("2").await, "b");
        assert_eq!(reasoner.ask("3").await, "a");
        assert_eq!(reasoner.get_prompts().await, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_mock_submitter_scripted_then_fallback() {
        let submitter = MockSubmitter::new(vec![continue_to("https://q.example/2")]);
        let payload = SubmissionPayload {
            email: "a@b.c".to_string(),
            secret: "s".to_string(),
            url: "https://q.example/1".to_string(),
            answer: "42".to_string(),
        };

        let first = submitter.submit("https://q.example/submit", &payload).await;
        let second = submitter.submit("https://q.example/submit", &payload).await;

        assert_eq!(first.continuation(), Some("https://q.example/2"));
        assert_eq!(second.continuation(), None);
        assert_eq!(submitter.get_submissions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_llm_provider_failure() {
        let provider = MockLlmProvider::with_failure();
        assert!(provider.health_check().await.is_err());
    }
}
