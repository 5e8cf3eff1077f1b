use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use vigil::affect::{Emotion, EmotionTriage};
use vigil::classify::CrimeClassifier;
use vigil::error::SkipReason;
use vigil::extract::{ArticleText, ExtractError, TextSource};
use vigil::harvest::{DownloadOutcome, DownloadedImage, ImageRef, ImageSource};
use vigil::matcher::{FaceEncoding, FaceMatcher};
use vigil::pipeline::{Outcome, Pipeline};
use vigil::providers::{EmotionClassifier, Entity, EntityTagger, FaceEncoder};
use vigil::scratch::{ScratchBatch, ScratchDir};

const CRIME_TEXT: &str = "Police said the robbery happened overnight.";
const BENIGN_TEXT: &str = "The city council debated the park budget.";

const REFERENCE_FACE: [f32; 2] = [0.5, 0.5];
const UNRELATED_FACE: [f32; 2] = [9.0, 9.0];

struct StubText(Option<&'static str>);

#[async_trait]
impl TextSource for StubText {
    async fn article_text(&self, _url: &str) -> Result<ArticleText, ExtractError> {
        match self.0 {
            Some(text) => Ok(ArticleText::new(text.to_string()).unwrap()),
            None => Err(ExtractError::NoParagraphs),
        }
    }
}

struct NoEntities;

#[async_trait]
impl EntityTagger for NoEntities {
    async fn tag(&self, _text: &str) -> Result<Vec<Entity>> {
        Ok(Vec::new())
    }
}

/// Materializes the first `valid` refs as real scratch files; the rest are
/// reported as fetch failures.
struct StubImages {
    refs: Vec<ImageRef>,
    valid: usize,
}

#[async_trait]
impl ImageSource for StubImages {
    async fn image_refs(&self, _url: &str) -> Vec<ImageRef> {
        self.refs.clone()
    }

    async fn download(
        &self,
        refs: &[ImageRef],
        batch: &mut ScratchBatch,
    ) -> Vec<DownloadOutcome> {
        let mut outcomes = Vec::new();
        for (index, image_ref) in refs.iter().enumerate() {
            if index < self.valid {
                let id = Uuid::new_v4();
                let path = batch.dir().join(format!("{}.jpg", id.simple()));
                fs::write(&path, b"jpeg bytes").unwrap();
                batch.register(path.clone());
                outcomes.push(DownloadOutcome::Saved(DownloadedImage {
                    id,
                    path,
                    source: image_ref.0.to_string(),
                }));
            } else {
                outcomes.push(DownloadOutcome::Skipped {
                    source: image_ref.0.to_string(),
                    reason: SkipReason::Fetch,
                });
            }
        }
        outcomes
    }
}

/// Encoder serving the reference dataset by file name and scratch images
/// from a scripted queue, one entry per call, in call order.
struct ScriptedEncoder {
    dataset: HashMap<String, Vec<f32>>,
    scratch: Mutex<VecDeque<Vec<Vec<f32>>>>,
}

impl ScriptedEncoder {
    fn new(scratch_faces: Vec<Vec<Vec<f32>>>) -> Self {
        let mut dataset = HashMap::new();
        dataset.insert("john.jpg".to_string(), REFERENCE_FACE.to_vec());
        Self {
            dataset,
            scratch: Mutex::new(scratch_faces.into()),
        }
    }
}

#[async_trait]
impl FaceEncoder for ScriptedEncoder {
    async fn encode(&self, image: &Path) -> Result<Vec<FaceEncoding>> {
        let name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some(values) = self.dataset.get(name) {
            return Ok(vec![FaceEncoding::new(values.clone())]);
        }
        let next = self.scratch.lock().unwrap().pop_front().unwrap_or_default();
        Ok(next.into_iter().map(FaceEncoding::new).collect())
    }
}

struct CountingEmotion {
    emotion: Emotion,
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl EmotionClassifier for CountingEmotion {
    async fn dominant_emotion(&self, _image: &Path) -> Result<Emotion> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.emotion)
    }
}

struct Harness {
    text: Option<&'static str>,
    refs: usize,
    valid: usize,
    scratch_faces: Vec<Vec<Vec<f32>>>,
    emotion: Emotion,
}

impl Harness {
    fn new() -> Self {
        Self {
            text: Some(CRIME_TEXT),
            refs: 0,
            valid: 0,
            scratch_faces: Vec::new(),
            emotion: Emotion::Neutral,
        }
    }

    /// Runs one invocation and reports the outcome, how many files are left
    /// in scratch storage afterwards, and how often the emotion model ran.
    async fn run(self) -> (Outcome, usize, usize) {
        let scratch_dir = tempfile::tempdir().unwrap();
        let dataset_dir = tempfile::tempdir().unwrap();
        fs::write(dataset_dir.path().join("john.jpg"), b"reference bytes").unwrap();

        let encoder = Arc::new(ScriptedEncoder::new(self.scratch_faces));
        let matcher = Arc::new(
            FaceMatcher::build(encoder, dataset_dir.path())
                .await
                .unwrap(),
        );

        let refs: Vec<ImageRef> = (0..self.refs)
            .map(|i| {
                ImageRef(Url::parse(&format!("https://cdn.example.com/{}.jpg", i)).unwrap())
            })
            .collect();

        let emotion_calls = Arc::new(Mutex::new(0));
        let triage = EmotionTriage::new(Arc::new(CountingEmotion {
            emotion: self.emotion,
            calls: emotion_calls.clone(),
        }));

        let pipeline = Pipeline::new(
            Arc::new(StubText(self.text)),
            Arc::new(StubImages {
                refs,
                valid: self.valid,
            }),
            CrimeClassifier::new(&["robbery".to_string()], Arc::new(NoEntities)),
            matcher,
            triage,
            ScratchDir::new(scratch_dir.path()).unwrap(),
        );

        let outcome = pipeline.process_url("https://news.example.com/story").await;
        let leftover = fs::read_dir(scratch_dir.path()).unwrap().count();
        let calls = *emotion_calls.lock().unwrap();
        (outcome, leftover, calls)
    }
}

#[tokio::test]
async fn unreadable_article_reports_extraction_failure() {
    let mut harness = Harness::new();
    harness.text = None;
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::ExtractionFailed);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn benign_article_stops_at_classification() {
    let mut harness = Harness::new();
    harness.text = Some(BENIGN_TEXT);
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::NotCrimeRelated);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn crime_article_without_images_reports_no_images() {
    let harness = Harness::new();
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::NoImagesFound);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn all_downloads_failing_reports_no_valid_images() {
    let mut harness = Harness::new();
    harness.refs = 3;
    harness.valid = 0;
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::NoValidImages);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn matching_face_reports_the_reference_label() {
    let mut harness = Harness::new();
    harness.refs = 1;
    harness.valid = 1;
    harness.scratch_faces = vec![vec![REFERENCE_FACE.to_vec()]];
    let (outcome, leftover, emotion_calls) = harness.run().await;
    assert_eq!(outcome, Outcome::SuspectMatched("john.jpg".to_string()));
    assert_eq!(leftover, 0);
    // A match short-circuits triage entirely.
    assert_eq!(emotion_calls, 0);
}

#[tokio::test]
async fn unmatched_fearful_face_reports_suspicious_emotion() {
    let mut harness = Harness::new();
    harness.refs = 2;
    harness.valid = 2;
    harness.scratch_faces = vec![vec![UNRELATED_FACE.to_vec()], vec![]];
    harness.emotion = Emotion::Fear;
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::SuspiciousEmotion(Emotion::Fear));
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn unmatched_benign_faces_report_no_finding() {
    let mut harness = Harness::new();
    harness.refs = 1;
    harness.valid = 1;
    harness.scratch_faces = vec![vec![UNRELATED_FACE.to_vec()]];
    harness.emotion = Emotion::Happy;
    let (outcome, leftover, emotion_calls) = harness.run().await;
    assert_eq!(outcome, Outcome::NoFinding);
    assert_eq!(leftover, 0);
    assert_eq!(emotion_calls, 1);
}

#[tokio::test]
async fn partial_download_failures_still_scan_the_rest() {
    let mut harness = Harness::new();
    harness.refs = 3;
    harness.valid = 1;
    harness.scratch_faces = vec![vec![REFERENCE_FACE.to_vec()]];
    let (outcome, leftover, _) = harness.run().await;
    assert_eq!(outcome, Outcome::SuspectMatched("john.jpg".to_string()));
    assert_eq!(leftover, 0);
}
