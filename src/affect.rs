use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::harvest::DownloadedImage;
use crate::providers::EmotionClassifier;
use crate::{TARGET_MODEL_REQUEST, TARGET_PIPELINE};

/// Dominant-emotion vocabulary of the affect model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Fear,
    Disgust,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Emotions that flag a depicted person for follow-up.
    pub fn is_suspicious(self) -> bool {
        matches!(self, Emotion::Angry | Emotion::Fear | Emotion::Disgust)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image paired with its dominant emotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionObservation {
    pub image_id: Uuid,
    pub emotion: Emotion,
}

pub struct EmotionTriage {
    classifier: Arc<dyn EmotionClassifier>,
}

impl EmotionTriage {
    pub fn new(classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self { classifier }
    }

    /// Suspicious observations in input order. Images the model cannot
    /// score are skipped.
    pub async fn analyze(&self, images: &[DownloadedImage]) -> Vec<EmotionObservation> {
        let mut observations = Vec::new();
        for image in images {
            let emotion = match self.classifier.dominant_emotion(&image.path).await {
                Ok(emotion) => emotion,
                Err(e) => {
                    warn!(target: TARGET_MODEL_REQUEST, "emotion inference failed for {}: {}, skipping", image.path.display(), e);
                    continue;
                }
            };
            debug!(target: TARGET_PIPELINE, "dominant emotion for {} is {}", image.path.display(), emotion);
            if emotion.is_suspicious() {
                observations.push(EmotionObservation {
                    image_id: image.id,
                    emotion,
                });
            }
        }
        observations
    }
}
