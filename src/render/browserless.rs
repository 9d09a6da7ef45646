//! Browserless rendering backend
//!
//! POSTs `{url}` to `{base_url}/content?token=KEY` and receives the fully
//! rendered HTML, so script-populated fragments (such as an origin span filled
//! in from `window.location`) are present in the markup.

use super::{PageRenderer, RenderError, RenderedPage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Browserless connection settings
#[derive(Debug, Clone)]
pub struct BrowserlessConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for BrowserlessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chrome.browserless.io".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Renderer backed by the Browserless `/content` API
pub struct BrowserlessRenderer {
    config: BrowserlessConfig,
    client: Client,
}

impl BrowserlessRenderer {
    pub fn new(config: BrowserlessConfig) -> Result<Self, RenderError> {
        if config.api_key.is_empty() {
            return Err(RenderError::NotConfigured(
                "Browserless API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RenderError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn content_endpoint(&self) -> String {
        format!("{}/content", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        Url::parse(url).map_err(|e| RenderError::InvalidUrl(format!("{url}: {e}")))?;

        debug!(url = %url, "Rendering page via Browserless");

        let response = self
            .client
            .post(self.content_endpoint())
            .query(&[("token", self.config.api_key.as_str())])
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| RenderError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Browserless returned non-success");
            return Err(RenderError::BackendStatus {
                status: status.as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| RenderError::Network(e.without_url().to_string()))?;

        debug!(url = %url, markup_len = html.len(), "Page rendered");

        Ok(RenderedPage::from_markup(html))
    }
}
