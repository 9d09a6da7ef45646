//! Page rendering seam
//!
//! A `PageRenderer` turns a URL into the rendered markup plus a plain-text view
//! of it. The production backend is Browserless; tests use `MockRenderer`.

pub mod browserless;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use browserless::{BrowserlessConfig, BrowserlessRenderer};

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid script pattern"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").expect("valid style pattern"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Rendered markup and its plain-text projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub markup: String,
    pub plain_text: String,
}

impl RenderedPage {
    /// Build a page from markup, deriving the plain text
    pub fn from_markup(markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let plain_text = html_to_text(&markup);
        Self { markup, plain_text }
    }
}

/// Rendering failures; all of them are fatal to the current run
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Renderer not configured: {0}")]
    NotConfigured(String),
    #[error("Renderer failed to render page: HTTP {status}")]
    BackendStatus { status: u16 },
    #[error("Renderer network error: {0}")]
    Network(String),
    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),
}

/// Turns a URL into rendered markup and text
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

/// Strip scripts, styles and tags, then collapse whitespace (pure function)
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, " ");
    let text = STYLE_BLOCK.replace_all(&text, " ");
    let text = ANY_TAG.replace_all(&text, " ");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}
