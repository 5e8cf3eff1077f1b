use std::sync::Arc;

use regex::RegexBuilder;
use tracing::{debug, warn};

use crate::providers::{EntityCategory, EntityTagger};
use crate::{TARGET_MODEL_REQUEST, TARGET_PIPELINE};

/// Binary verdict on whether article text concerns a criminal act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Criminal,
    NotCriminal,
}

/// Stateless classifier; the verdict is recomputed per request.
pub struct CrimeClassifier {
    keywords: Vec<String>,
    pattern: Option<regex::Regex>,
    tagger: Arc<dyn EntityTagger>,
}

impl CrimeClassifier {
    pub fn new(keywords: &[String], tagger: Arc<dyn EntityTagger>) -> Self {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        // An empty alternation would match every string; build no pattern
        // at all when the keyword list is empty.
        let pattern = if keywords.is_empty() {
            None
        } else {
            let alternation = keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                    .case_insensitive(true)
                    .build()
                    .expect("escaped keyword alternation is a valid pattern"),
            )
        };

        Self {
            keywords,
            pattern,
            tagger,
        }
    }

    /// Keyword rule first: any whole-word keyword hit wins outright.
    /// Otherwise organization and geopolitical entities get a weaker
    /// substring check, lowercased on both sides, first hit in document
    /// order wins.
    pub async fn classify(&self, text: &str) -> Verdict {
        if let Some(pattern) = &self.pattern {
            if pattern.is_match(text) {
                debug!(target: TARGET_PIPELINE, "keyword match, classifying as criminal");
                return Verdict::Criminal;
            }
        }

        let entities = match self.tagger.tag(text).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(target: TARGET_MODEL_REQUEST, "entity tagging failed, keeping keyword verdict: {}", e);
                return Verdict::NotCriminal;
            }
        };

        for entity in entities {
            if !matches!(
                entity.label,
                EntityCategory::Organization | EntityCategory::GeoPolitical
            ) {
                continue;
            }
            let surface = entity.text.to_lowercase();
            if self.keywords.iter().any(|k| surface.contains(k.as_str())) {
                debug!(target: TARGET_PIPELINE, "entity {:?} carries a crime keyword, classifying as criminal", entity.text);
                return Verdict::Criminal;
            }
        }

        Verdict::NotCriminal
    }
}
