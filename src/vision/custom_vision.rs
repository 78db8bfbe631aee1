//! Custom Vision prediction client

use super::{ClassificationProject, Prediction, VisionConfig, VisionError, VisionService};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

/// Classifies images against a published Custom Vision iteration
pub struct CustomVisionService {
    client: Client,
    endpoint: Url,
    prediction_key: String,
}

impl CustomVisionService {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VisionError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            prediction_key: config.prediction_key.clone(),
        })
    }

    /// `{endpoint}/customvision/v3.0/Prediction/{project}/classify/iterations/{name}/image`
    fn prediction_url(&self, project: &ClassificationProject) -> Result<Url, VisionError> {
        let project_id = project.project_id.to_string();
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| VisionError::invalid_request("Endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend([
                "customvision",
                "v3.0",
                "Prediction",
                project_id.as_str(),
                "classify",
                "iterations",
                project.published_name.as_str(),
                "image",
            ]);
        Ok(url)
    }
}

// Wire format

#[derive(Debug, Deserialize)]
struct ImagePrediction {
    #[serde(default)]
    predictions: Vec<PredictionModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionModel {
    #[serde(default)]
    tag_name: String,
    probability: f64,
}

impl From<PredictionModel> for Prediction {
    fn from(model: PredictionModel) -> Self {
        Prediction {
            label: model.tag_name,
            probability: model.probability,
        }
    }
}

fn parse_predictions(body: &str) -> Result<Vec<Prediction>, VisionError> {
    let parsed: ImagePrediction = serde_json::from_str(body)
        .map_err(|e| VisionError::unknown(format!("Failed to parse prediction: {e}")))?;
    Ok(parsed.predictions.into_iter().map(Prediction::from).collect())
}

#[async_trait]
impl VisionService for CustomVisionService {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        let url = self.prediction_url(project)?;

        let response = self
            .client
            .post(url)
            .header("Prediction-Key", &self.prediction_key)
            .header("content-type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| VisionError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(VisionError::from_status(status, &body));
        }

        parse_predictions(&body)
    }

    fn name(&self) -> &str {
        "custom_vision"
    }
}
