use std::sync::Arc;

use tracing::{debug, info};

use crate::affect::{Emotion, EmotionObservation, EmotionTriage};
use crate::classify::{CrimeClassifier, Verdict};
use crate::extract::TextSource;
use crate::harvest::{DownloadOutcome, DownloadedImage, ImageSource};
use crate::matcher::FaceMatcher;
use crate::scratch::ScratchDir;
use crate::TARGET_PIPELINE;

/// Terminal result of one `process_url` invocation. Never an error: every
/// early failure is encoded as a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ExtractionFailed,
    NotCrimeRelated,
    NoImagesFound,
    NoValidImages,
    SuspectMatched(String),
    SuspiciousEmotion(Emotion),
    NoFinding,
}

enum ImageScan {
    Matched(String),
    Observations(Vec<EmotionObservation>),
}

pub struct Pipeline {
    text: Arc<dyn TextSource>,
    images: Arc<dyn ImageSource>,
    classifier: CrimeClassifier,
    matcher: Arc<FaceMatcher>,
    triage: EmotionTriage,
    scratch: ScratchDir,
}

impl Pipeline {
    pub fn new(
        text: Arc<dyn TextSource>,
        images: Arc<dyn ImageSource>,
        classifier: CrimeClassifier,
        matcher: Arc<FaceMatcher>,
        triage: EmotionTriage,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            text,
            images,
            classifier,
            matcher,
            triage,
            scratch,
        }
    }

    /// Runs the decision sequence for one article, short-circuiting on the
    /// first conclusive stage. Scratch files created along the way are
    /// removed exactly once before this returns, on every branch.
    pub async fn process_url(&self, url: &str) -> Outcome {
        let text = match self.text.article_text(url).await {
            Ok(text) => text,
            Err(e) => {
                info!(target: TARGET_PIPELINE, "could not extract article text from {}: {}", url, e);
                return Outcome::ExtractionFailed;
            }
        };

        if self.classifier.classify(text.as_str()).await == Verdict::NotCriminal {
            info!(target: TARGET_PIPELINE, "{} is not crime-related", url);
            return Outcome::NotCrimeRelated;
        }

        let refs = self.images.image_refs(url).await;
        if refs.is_empty() {
            info!(target: TARGET_PIPELINE, "no images found in {}", url);
            return Outcome::NoImagesFound;
        }

        let mut batch = self.scratch.begin_batch();
        let outcomes = self.images.download(&refs, &mut batch).await;
        let mut skipped = 0usize;
        let downloaded: Vec<DownloadedImage> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                DownloadOutcome::Saved(image) => Some(image),
                DownloadOutcome::Skipped { .. } => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            debug!(target: TARGET_PIPELINE, "skipped {} of {} harvested images", skipped, refs.len());
        }

        if downloaded.is_empty() {
            info!(target: TARGET_PIPELINE, "no harvested image from {} survived download", url);
            return Outcome::NoValidImages;
        }

        // Matching short-circuits triage; either way the batch is released
        // exactly once before the outcome leaves this function.
        let scan = self.scan_images(&downloaded).await;
        batch.cleanup();

        match scan {
            ImageScan::Matched(label) => {
                info!(target: TARGET_PIPELINE, "suspect match for {}: {}", url, label);
                Outcome::SuspectMatched(label)
            }
            ImageScan::Observations(observations) => match observations.first() {
                Some(observation) => {
                    info!(target: TARGET_PIPELINE, "suspicious emotion for {}: {}", url, observation.emotion);
                    Outcome::SuspiciousEmotion(observation.emotion)
                }
                None => {
                    info!(target: TARGET_PIPELINE, "no finding for {}", url);
                    Outcome::NoFinding
                }
            },
        }
    }

    async fn scan_images(&self, images: &[DownloadedImage]) -> ImageScan {
        if let Some(found) = self.matcher.find_match(images).await {
            return ImageScan::Matched(found.label);
        }
        ImageScan::Observations(self.triage.analyze(images).await)
    }
}
