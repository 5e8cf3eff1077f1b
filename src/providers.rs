use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::affect::Emotion;
use crate::matcher::FaceEncoding;
use crate::TARGET_MODEL_REQUEST;

const MODEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One named entity surfaced by the tagger.
#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityCategory,
}

/// Entity categories the classifier distinguishes. Everything else folds
/// into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EntityCategory {
    #[serde(rename = "ORG")]
    Organization,
    #[serde(rename = "GPE")]
    GeoPolitical,
    #[serde(other)]
    Other,
}

/// Tags named entities in article text, in document order.
#[async_trait]
pub trait EntityTagger: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Produces one encoding per detected face, in detection order. An image
/// with no detectable faces yields an empty vector; that is not an error.
#[async_trait]
pub trait FaceEncoder: Send + Sync {
    async fn encode(&self, image: &Path) -> Result<Vec<FaceEncoding>>;
}

/// Scores the dominant emotion of one image. Implementations must tolerate
/// non-face and low-quality input rather than failing, and always return a
/// single normalized label.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn dominant_emotion(&self, image: &Path) -> Result<Emotion>;
}

/// HTTP client for the model-serving sidecar. One attempt per call, bounded
/// by a client-level timeout.
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(MODEL_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_image<T: DeserializeOwned>(&self, endpoint: &str, image: &Path) -> Result<T> {
        let bytes = tokio::fs::read(image).await?;
        debug!(target: TARGET_MODEL_REQUEST, "posting {} ({} bytes) to {}", image.display(), bytes.len(), endpoint);
        let request = ImageRequest {
            img: BASE64.encode(&bytes),
        };
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct NerResponse {
    entities: Vec<Entity>,
}

#[derive(Serialize)]
struct ImageRequest {
    img: String,
}

#[derive(Deserialize)]
struct RepresentResponse {
    encodings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    dominant_emotion: Emotion,
}

#[async_trait]
impl EntityTagger for InferenceClient {
    async fn tag(&self, text: &str) -> Result<Vec<Entity>> {
        debug!(target: TARGET_MODEL_REQUEST, "requesting entity tags for {} chars of text", text.len());
        let response: NerResponse = self
            .client
            .post(format!("{}/ner", self.base_url))
            .json(&NerRequest { text })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.entities)
    }
}

#[async_trait]
impl FaceEncoder for InferenceClient {
    async fn encode(&self, image: &Path) -> Result<Vec<FaceEncoding>> {
        let response: RepresentResponse = self.post_image("/represent", image).await?;
        Ok(response
            .encodings
            .into_iter()
            .map(FaceEncoding::new)
            .collect())
    }
}

#[async_trait]
impl EmotionClassifier for InferenceClient {
    async fn dominant_emotion(&self, image: &Path) -> Result<Emotion> {
        let response: AnalyzeResponse = self.post_image("/analyze", image).await?;
        Ok(response.dominant_emotion)
    }
}
