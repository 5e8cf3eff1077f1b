use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Shared HTTP client for page and image fetches.
pub fn web_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()
}

/// Concatenated paragraph text of one article. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText(String);

impl ArticleText {
    pub fn new(text: String) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The three ways extraction fails. Callers treat them all the same; the
/// distinction exists for logging.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("response was not HTML")]
    NotHtml,
    #[error("no paragraph text found")]
    NoParagraphs,
}

/// Supplies article text for a URL.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn article_text(&self, url: &str) -> Result<ArticleText, ExtractError>;
}

pub struct TextExtractor {
    client: reqwest::Client,
}

impl TextExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextSource for TextExtractor {
    async fn article_text(&self, url: &str) -> Result<ArticleText, ExtractError> {
        debug!(target: TARGET_WEB_REQUEST, "extracting article text from {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("text/html") {
            return Err(ExtractError::NotHtml);
        }

        let body = response.text().await?;
        let text = paragraph_text(&body).ok_or(ExtractError::NoParagraphs)?;
        debug!(target: TARGET_WEB_REQUEST, "extracted {} chars from {}", text.as_str().len(), url);
        Ok(text)
    }
}

/// Concatenates the text of every `<p>` element in document order,
/// separated by single spaces.
pub fn paragraph_text(html: &str) -> Option<ArticleText> {
    let document = Html::parse_document(html);
    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<String>())
        .collect();
    if paragraphs.is_empty() {
        return None;
    }
    ArticleText::new(paragraphs.join(" "))
}
