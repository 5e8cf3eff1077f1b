use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use vigil::affect::EmotionTriage;
use vigil::classify::CrimeClassifier;
use vigil::config::{load_crime_keywords, Config};
use vigil::extract::{web_client, TextExtractor};
use vigil::harvest::ImageHarvester;
use vigil::logging::configure_logging;
use vigil::matcher::FaceMatcher;
use vigil::pipeline::{Outcome, Pipeline};
use vigil::providers::InferenceClient;
use vigil::scratch::ScratchDir;

/// Checks news articles for crime coverage, known suspects and suspicious
/// emotional affect.
#[derive(Parser)]
#[command(name = "vigil", version, about)]
struct Cli {
    /// Article URLs to process, in order.
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() {
    configure_logging();

    let cli = Cli::parse();
    let config = Config::from_env();

    let pipeline = match build_pipeline(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("startup failed: {:#}", e);
            eprintln!("vigil: {:#}", e);
            process::exit(1);
        }
    };

    for url in &cli.urls {
        let outcome = pipeline.process_url(url).await;
        println!("{}", render(&outcome));
    }
}

async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let keywords = load_crime_keywords(&config.keywords_path)?;
    info!(
        "loaded {} crime keywords from {}",
        keywords.len(),
        config.keywords_path.display()
    );

    let inference = Arc::new(InferenceClient::new(&config.inference_url)?);

    // The reference cache is built eagerly, before the first request, so
    // every invocation shares one read-only copy.
    let matcher = Arc::new(FaceMatcher::build(inference.clone(), &config.dataset_dir).await?);

    let scratch = ScratchDir::new(&config.scratch_dir)?;
    let http = web_client()?;

    Ok(Pipeline::new(
        Arc::new(TextExtractor::new(http.clone())),
        Arc::new(ImageHarvester::new(http)),
        CrimeClassifier::new(&keywords, inference.clone()),
        matcher,
        EmotionTriage::new(inference),
        scratch,
    ))
}

fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::ExtractionFailed => "Could not extract article text.".to_string(),
        Outcome::NotCrimeRelated => "This article is not crime-related.".to_string(),
        Outcome::NoImagesFound => "No images found in article.".to_string(),
        Outcome::NoValidImages => "Could not download any valid images.".to_string(),
        Outcome::SuspectMatched(label) => format!("Matched with known criminal: {}", label),
        Outcome::SuspiciousEmotion(emotion) => {
            format!("Suspicious behavior detected (Emotion: {})", emotion)
        }
        Outcome::NoFinding => "No criminal or suspicious behavior detected.".to_string(),
    }
}
