//! Crate-level error types for quizchain
//!
//! Each collaborator seam has its own error enum; `QuizError` collects them for
//! the places that cross seams (dispatch handlers, the entry point, the CLI).

use crate::config::ConfigError;
use crate::extract::ExtractError;
use crate::llm::provider::LlmError;
use crate::render::RenderError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Prefix carried by every answer string that stands in for a failure
pub const ERROR_ANSWER_PREFIX: &str = "error: ";

const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+").expect("valid secret pattern")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid path pattern")
});

/// Main error type for quiz workflow operations
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No scrape link found on {url}")]
    ScrapeLinkNotFound { url: String },

    #[error("Secret code not found on {url}")]
    SecretNotFound { url: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl QuizError {
    /// Render this error as an answer string for submission
    pub fn to_answer(&self) -> String {
        format!(
            "{ERROR_ANSWER_PREFIX}{}",
            sanitize_error_message(&self.to_string())
        )
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Whether an answer string is a failure stand-in rather than a computed answer
pub fn is_error_answer(answer: &str) -> bool {
    answer.starts_with(ERROR_ANSWER_PREFIX)
}

/// Redact credentials and sensitive paths, then cap the length at 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for quiz operations
pub type QuizResult<T> = Result<T, QuizError>;
