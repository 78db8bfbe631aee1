//! Classifier configuration from the environment

use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const PROJECT_ID: &str = "CUSTOM_VISION_PROJECT_ID";
const PUBLISHED_NAME: &str = "CUSTOM_VISION_PUBLISHED_NAME";
const REGION_ENDPOINT: &str = "CUSTOM_VISION_REGION_ENDPOINT";
const TRAINING_KEY: &str = "CUSTOM_VISION_TRAINING_KEY";
const PREDICTION_KEY: &str = "CUSTOM_VISION_PREDICTION_KEY";
const PROBABILITY_THRESHOLD: &str = "CUSTOM_VISION_PROBABILITY_THRESHOLD";
const TIMEOUT_SECS: &str = "CUSTOM_VISION_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `Section__Key` spelling of a variable, as set by hosts that bind the
/// `CustomVision` configuration section from the environment
fn section_name(name: &str) -> Option<&'static str> {
    match name {
        PROJECT_ID => Some("CustomVision__ProjectId"),
        PUBLISHED_NAME => Some("CustomVision__PublishedName"),
        REGION_ENDPOINT => Some("CustomVision__RegionEndpoint"),
        TRAINING_KEY => Some("CustomVision__TrainingKey"),
        PREDICTION_KEY => Some("CustomVision__PredictionKey"),
        PROBABILITY_THRESHOLD => Some("CustomVision__ProbabilityThreshold"),
        TIMEOUT_SECS => Some("CustomVision__TimeoutSecs"),
        _ => None,
    }
}

/// Read a variable by its primary name, then its section name. Blank values
/// count as unset.
fn read(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    let non_blank = |value: String| (!value.trim().is_empty()).then_some(value);
    lookup(name)
        .and_then(non_blank)
        .or_else(|| section_name(name).and_then(|alias| lookup(alias)).and_then(non_blank))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Custom Vision settings
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub project_id: Uuid,
    pub published_name: String,
    /// Regional prediction endpoint, e.g. `https://westeurope.api.cognitive.microsoft.com`
    pub endpoint: Url,
    /// Optional. Prediction works without it; it is only needed to upload
    /// labelled images for retraining, which the bot does not do yet.
    pub training_key: Option<String>,
    pub prediction_key: String,
    pub probability_threshold: f64,
    pub timeout: Duration,
}

impl VisionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Each setting is read from its
    /// `CUSTOM_VISION_*` name or its `CustomVision__*` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| read(&lookup, name);
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let project_id = require(PROJECT_ID)?;
        let project_id = Uuid::parse_str(project_id.trim()).map_err(|e| ConfigError::Invalid {
            name: PROJECT_ID,
            reason: e.to_string(),
        })?;

        let endpoint = require(REGION_ENDPOINT)?;
        let endpoint = Url::parse(endpoint.trim()).map_err(|e| ConfigError::Invalid {
            name: REGION_ENDPOINT,
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                name: REGION_ENDPOINT,
                reason: "not a base URL".to_string(),
            });
        }

        let threshold = require(PROBABILITY_THRESHOLD)?;
        let probability_threshold: f64 =
            threshold.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PROBABILITY_THRESHOLD,
                reason: format!("{threshold:?} is not a number"),
            })?;
        if !(0.0..=1.0).contains(&probability_threshold) {
            return Err(ConfigError::Invalid {
                name: PROBABILITY_THRESHOLD,
                reason: format!("{probability_threshold} is outside [0, 1]"),
            });
        }

        Ok(Self {
            project_id,
            published_name: require(PUBLISHED_NAME)?,
            endpoint,
            training_key: get(TRAINING_KEY),
            prediction_key: require(PREDICTION_KEY)?,
            probability_threshold,
            timeout: request_timeout(&lookup),
        })
    }
}

/// Classifier request timeout; falls back to the default on unset or bad values
pub fn request_timeout(lookup: impl Fn(&str) -> Option<String>) -> Duration {
    let secs = read(&lookup, TIMEOUT_SECS)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}
