//! Attachment download

use super::VisionError;
use reqwest::{Client, Url};
use std::time::Duration;

/// Downloads the bytes behind an attachment's content URL
#[derive(Clone)]
pub struct AttachmentClient {
    client: Client,
}

impl AttachmentClient {
    pub fn new(timeout: Duration) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, VisionError> {
        let url = parse_content_url(url)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| VisionError::fetch(format!("Attachment request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisionError::fetch(format!(
                "Attachment download returned HTTP {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VisionError::fetch(format!("Failed to read attachment: {e}")))?;

        tracing::debug!(%url, bytes = bytes.len(), "Attachment downloaded");
        Ok(bytes.to_vec())
    }
}

/// Only absolute http(s) URLs are downloaded
fn parse_content_url(url: &str) -> Result<Url, VisionError> {
    let parsed = Url::parse(url)
        .map_err(|e| VisionError::fetch(format!("Invalid attachment URL {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(VisionError::fetch(format!(
            "Unsupported attachment URL scheme {scheme:?}"
        ))),
    }
}
