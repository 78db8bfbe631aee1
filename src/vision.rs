//! Image classification
//!
//! Provides a common interface for image classifiers plus the Custom Vision
//! prediction client and the attachment downloader that feeds it.

mod attachment;
mod config;
mod custom_vision;
mod error;

pub use attachment::AttachmentClient;
pub use config::{request_timeout, ConfigError, VisionConfig};
pub use custom_vision::CustomVisionService;
pub use error::{VisionError, VisionErrorKind};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One label scored by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence in [0, 1]
    pub probability: f64,
}

/// A trained project and the published iteration to predict against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationProject {
    pub project_id: Uuid,
    pub published_name: String,
}

impl ClassificationProject {
    pub fn new(project_id: Uuid, published_name: impl Into<String>) -> Self {
        Self {
            project_id,
            published_name: published_name.into(),
        }
    }
}

/// Common interface for image classifiers
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Classify an image, returning predictions in service order
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError>;

    /// Service name for logs
    fn name(&self) -> &str;
}

/// Logging wrapper for vision services
pub struct LoggingService {
    inner: Arc<dyn VisionService>,
    name: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn VisionService>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl VisionService for LoggingService {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        let start = std::time::Instant::now();
        let result = self.inner.classify(project, image).await;
        let duration = start.elapsed();

        match &result {
            Ok(predictions) => {
                tracing::info!(
                    service = %self.name,
                    project_id = %project.project_id,
                    published_name = %project.published_name,
                    duration_ms = %duration.as_millis(),
                    image_bytes = image.len(),
                    predictions = predictions.len(),
                    "Classification completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    service = %self.name,
                    project_id = %project.project_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Classification failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stand-in used when the classifier is not configured. Every call fails.
pub struct UnavailableService {
    reason: String,
}

impl UnavailableService {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl VisionService for UnavailableService {
    async fn classify(
        &self,
        _project: &ClassificationProject,
        _image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        Err(VisionError::unavailable(format!(
            "Classifier not configured: {}",
            self.reason
        )))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
