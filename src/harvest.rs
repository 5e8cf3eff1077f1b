use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use image::ImageFormat;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::SkipReason;
use crate::scratch::ScratchBatch;
use crate::TARGET_WEB_REQUEST;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// An absolute image URL discovered in an article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(pub Url);

/// One image persisted to scratch storage, owned by a single pipeline
/// invocation.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub id: Uuid,
    pub path: PathBuf,
    pub source: String,
}

/// Per-item download result. Failures stay attached to the item that
/// produced them instead of disappearing into a catch-all.
#[derive(Debug)]
pub enum DownloadOutcome {
    Saved(DownloadedImage),
    Skipped { source: String, reason: SkipReason },
}

/// Supplies image references for a URL and materializes them into scratch
/// storage.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn image_refs(&self, url: &str) -> Vec<ImageRef>;

    async fn download(&self, refs: &[ImageRef], batch: &mut ScratchBatch)
        -> Vec<DownloadOutcome>;
}

pub struct ImageHarvester {
    client: reqwest::Client,
}

impl ImageHarvester {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download_one(&self, image_ref: &ImageRef, batch: &mut ScratchBatch) -> DownloadOutcome {
        let source = image_ref.0.to_string();

        let response = match self.client.get(image_ref.0.clone()).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response,
                Err(e) => {
                    warn!(target: TARGET_WEB_REQUEST, "image fetch returned error status for {}: {}", source, e);
                    return DownloadOutcome::Skipped {
                        source,
                        reason: SkipReason::Fetch,
                    };
                }
            },
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "failed to fetch image {}: {}", source, e);
                return DownloadOutcome::Skipped {
                    source,
                    reason: SkipReason::Fetch,
                };
            }
        };

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "failed to read image body from {}: {}", source, e);
                return DownloadOutcome::Skipped {
                    source,
                    reason: SkipReason::Fetch,
                };
            }
        };

        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(target: TARGET_WEB_REQUEST, "{} is not a decodable image: {}", source, e);
                return DownloadOutcome::Skipped {
                    source,
                    reason: SkipReason::Decode,
                };
            }
        };

        let id = Uuid::new_v4();
        let path = batch.dir().join(format!("{}.jpg", id.simple()));
        if let Err(e) = decoded.to_rgb8().save_with_format(&path, ImageFormat::Jpeg) {
            warn!(target: TARGET_WEB_REQUEST, "failed to persist image from {}: {}", source, e);
            return DownloadOutcome::Skipped {
                source,
                reason: SkipReason::Decode,
            };
        }
        batch.register(path.clone());

        debug!(target: TARGET_WEB_REQUEST, "saved image {} as {}", source, path.display());
        DownloadOutcome::Saved(DownloadedImage { id, path, source })
    }
}

#[async_trait]
impl ImageSource for ImageHarvester {
    /// Image URLs in encounter order, duplicates collapsed by URL string.
    /// A page that cannot be fetched yields the empty set.
    async fn image_refs(&self, url: &str) -> Vec<ImageRef> {
        let page_url = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "cannot parse page URL {}: {}", url, e);
                return Vec::new();
            }
        };

        let body = match self.client.get(page_url.clone()).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(target: TARGET_WEB_REQUEST, "failed to read page body from {}: {}", url, e);
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "failed to fetch page {}: {}", url, e);
                return Vec::new();
            }
        };

        image_refs_from_html(&body, &page_url)
    }

    async fn download(
        &self,
        refs: &[ImageRef],
        batch: &mut ScratchBatch,
    ) -> Vec<DownloadOutcome> {
        let mut outcomes = Vec::with_capacity(refs.len());
        for image_ref in refs {
            outcomes.push(self.download_one(image_ref, batch).await);
        }
        outcomes
    }
}

/// Collects every `<img>` `src` attribute, resolved against the page URL.
/// Elements without a `src` and sources that do not resolve are dropped.
pub fn image_refs_from_html(html: &str, page_url: &Url) -> Vec<ImageRef> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for img in document.select(&IMG) {
        let src = match img.value().attr("src") {
            Some(src) => src,
            None => continue,
        };
        let absolute = match page_url.join(src) {
            Ok(absolute) => absolute,
            Err(e) => {
                debug!(target: TARGET_WEB_REQUEST, "dropping unresolvable image src {:?}: {}", src, e);
                continue;
            }
        };
        if seen.insert(absolute.to_string()) {
            refs.push(ImageRef(absolute));
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://news.example.com/story/42").unwrap()
    }

    #[test]
    fn resolves_relative_sources() {
        let html = r#"<img src="/img/a.jpg"><img src="b.png">"#;
        let refs = image_refs_from_html(html, &base());
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].0.as_str(), "https://news.example.com/img/a.jpg");
        assert_eq!(refs[1].0.as_str(), "https://news.example.com/story/b.png");
    }

    #[test]
    fn skips_images_without_src() {
        let html = r#"<img alt="decorative"><img src="https://cdn.example.com/c.jpg">"#;
        let refs = image_refs_from_html(html, &base());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0.as_str(), "https://cdn.example.com/c.jpg");
    }

    #[test]
    fn collapses_duplicate_urls() {
        let html = r#"<img src="same.jpg"><img src="same.jpg"><img src="other.jpg">"#;
        let refs = image_refs_from_html(html, &base());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn keeps_encounter_order() {
        let html = r#"<img src="1.jpg"><p><img src="2.jpg"></p><img src="3.jpg">"#;
        let refs = image_refs_from_html(html, &base());
        let names: Vec<_> = refs
            .iter()
            .map(|r| r.0.path_segments().unwrap().last().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg", "3.jpg"]);
    }
}
