use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const KEYWORDS_PATH_ENV: &str = "VIGIL_KEYWORDS_PATH";
const DATASET_DIR_ENV: &str = "VIGIL_DATASET_DIR";
const SCRATCH_DIR_ENV: &str = "VIGIL_SCRATCH_DIR";
const INFERENCE_URL_ENV: &str = "VIGIL_INFERENCE_URL";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub keywords_path: PathBuf,
    pub dataset_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub inference_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            keywords_path: env::var(KEYWORDS_PATH_ENV)
                .unwrap_or_else(|_| "crime_keywords.csv".to_string())
                .into(),
            dataset_dir: env::var(DATASET_DIR_ENV)
                .unwrap_or_else(|_| "input_images".to_string())
                .into(),
            scratch_dir: env::var(SCRATCH_DIR_ENV)
                .unwrap_or_else(|_| "temp_images".to_string())
                .into(),
            inference_url: env::var(INFERENCE_URL_ENV)
                .unwrap_or_else(|_| "http://localhost:5005".to_string()),
        }
    }
}

/// Loads the crime keyword list: a header row, then one keyword per row in
/// the first column.
pub fn load_crime_keywords(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::KeywordFile {
        path: path.display().to_string(),
        source,
    })?;

    let keywords: Vec<String> = contents
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect();

    if keywords.is_empty() {
        return Err(ConfigError::NoKeywords {
            path: path.display().to_string(),
        });
    }

    Ok(keywords)
}
