//! Document extraction: linked PDFs, linked CSVs and inline HTML tables
//!
//! Table parsing and CSV row splitting are pure; fetching goes through the
//! `DocumentExtractor` seam so the dispatcher can be tested without a network.

pub mod csv;
pub mod tables;

use crate::render::BrowserlessConfig;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub use self::csv::parse_csv_rows;
pub use self::tables::{parse_tables, Table};

static ABSOLUTE_PDF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.pdf(?:[?#][^\s"'<>]*)?"#).expect("valid pdf pattern")
});
static ABSOLUTE_CSV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.csv(?:[?#][^\s"'<>]*)?"#).expect("valid csv pattern")
});
static RELATIVE_PDF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:href|src)\s*=\s*["']([^"'\s]+\.pdf(?:[?#][^"'\s]*)?)["']"#)
        .expect("valid pdf pattern")
});
static RELATIVE_CSV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:href|src)\s*=\s*["']([^"'\s]+\.csv(?:[?#][^"'\s]*)?)["']"#)
        .expect("valid csv pattern")
});

/// Linked document types the dispatcher knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Csv,
}

impl DocumentKind {
    fn patterns(self) -> (&'static Regex, &'static Regex) {
        match self {
            DocumentKind::Pdf => (&*ABSOLUTE_PDF, &*RELATIVE_PDF),
            DocumentKind::Csv => (&*ABSOLUTE_CSV, &*RELATIVE_CSV),
        }
    }
}

/// Find the first link to a document of the given kind (pure function)
///
/// Absolute links win; otherwise the first relative `href`/`src` is joined
/// against `page_url`.
pub fn find_document_link(markup: &str, page_url: &str, kind: DocumentKind) -> Option<String> {
    let (absolute, relative) = kind.patterns();

    if let Some(found) = absolute.find(markup) {
        return Some(found.as_str().to_string());
    }

    let base = Url::parse(page_url).ok()?;
    relative
        .captures_iter(markup)
        .filter_map(|caps| base.join(&caps[1]).ok())
        .map(|joined| joined.to_string())
        .next()
}

/// Extraction failures
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Extractor not configured: {0}")]
    NotConfigured(String),
    #[error("Fetching {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid extraction response: {0}")]
    InvalidResponse(String),
}

/// Fetches and decodes linked documents
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Plain text of a PDF document
    async fn pdf_text(&self, url: &str) -> Result<String, ExtractError>;

    /// Rows of a CSV document
    async fn csv_rows(&self, url: &str) -> Result<Vec<Vec<String>>, ExtractError>;
}

#[derive(Debug, Deserialize)]
struct PdfTextResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP-backed extractor; PDFs are converted to text by Browserless
pub struct HttpExtractor {
    client: Client,
    browserless: BrowserlessConfig,
}

impl HttpExtractor {
    pub fn new(browserless: BrowserlessConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(browserless.timeout)
            .build()
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        Ok(Self {
            client,
            browserless,
        })
    }

    async fn fetch(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ExtractError> {
        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl DocumentExtractor for HttpExtractor {
    async fn pdf_text(&self, url: &str) -> Result<String, ExtractError> {
        if self.browserless.api_key.is_empty() {
            return Err(ExtractError::NotConfigured(
                "Missing Browserless API key".to_string(),
            ));
        }

        debug!(url = %url, "Extracting PDF text");

        let endpoint = format!(
            "{}/pdf/text",
            self.browserless.base_url.trim_end_matches('/')
        );
        let request = self
            .client
            .get(&endpoint)
            .query(&[("token", self.browserless.api_key.as_str()), ("pdf", url)]);

        let body: PdfTextResponse = self
            .fetch(request, url)
            .await?
            .json()
            .await
            .map_err(|e| ExtractError::InvalidResponse(e.without_url().to_string()))?;

        Ok(body.text.unwrap_or_default())
    }

    async fn csv_rows(&self, url: &str) -> Result<Vec<Vec<String>>, ExtractError> {
        debug!(url = %url, "Fetching CSV");

        let text = self
            .fetch(self.client.get(url), url)
            .await?
            .text()
            .await
            .map_err(|e| ExtractError::Network(e.without_url().to_string()))?;

        Ok(parse_csv_rows(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_pdf_link() {
        let markup = r#"<a href="https://cdn.example.com/files/report.pdf">report</a>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/quiz-1", DocumentKind::Pdf),
            Some("https://cdn.example.com/files/report.pdf".to_string())
        );
    }

    #[test]
    fn test_relative_csv_link_is_joined() {
        let markup = r#"<a href="/data/sales.csv">Download</a>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/quiz/2?x=1", DocumentKind::Csv),
            Some("https://q.example/data/sales.csv".to_string())
        );
    }

    #[test]
    fn test_relative_link_with_query() {
        let markup = r#"<a href='files/a.CSV?v=2'>csv</a>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/quiz/", DocumentKind::Csv),
            Some("https://q.example/quiz/files/a.CSV?v=2".to_string())
        );
    }

    #[test]
    fn test_relative_link_keeps_encoded_query() {
        let markup = r#"<p>Data: <a href="/data.csv?email=a%40b.c">csv</a></p>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/q", DocumentKind::Csv),
            Some("https://q.example/data.csv?email=a%40b.c".to_string())
        );
    }

    #[test]
    fn test_absolute_link_keeps_query() {
        let markup = r#"<a href="https://cdn.example.com/r.pdf?sig=abc&amp;v=1">r</a>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/", DocumentKind::Pdf),
            Some("https://cdn.example.com/r.pdf?sig=abc&amp;v=1".to_string())
        );
    }

    #[test]
    fn test_absolute_wins_over_relative() {
        let markup = r#"<a href="/local.pdf">a</a> https://other.example/remote.pdf"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/", DocumentKind::Pdf),
            Some("https://other.example/remote.pdf".to_string())
        );
    }

    #[test]
    fn test_kind_is_respected() {
        let markup = r#"<a href="/data.csv">csv</a>"#;
        assert_eq!(
            find_document_link(markup, "https://q.example/", DocumentKind::Pdf),
            None
        );
    }

    #[test]
    fn test_relative_link_needs_parseable_page_url() {
        let markup = r#"<a href="/data.csv">csv</a>"#;
        assert_eq!(find_document_link(markup, "not a url", DocumentKind::Csv), None);
    }

    #[tokio::test]
    async fn test_pdf_requires_api_key() {
        let extractor = HttpExtractor::new(BrowserlessConfig::default()).unwrap();
        let result = extractor.pdf_text("https://q.example/a.pdf").await;
        assert!(matches!(result, Err(ExtractError::NotConfigured(_))));
    }
}
