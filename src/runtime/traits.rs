//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::dialog::DialogState;
use crate::vision::{ClassificationProject, Prediction, VisionError};
use async_trait::async_trait;

/// Storage for per-conversation dialog state
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the state, `None` for a conversation never seen
    async fn get(&self, key: &str) -> Result<Option<DialogState>, String>;

    /// Save the state
    async fn put(&self, key: &str, state: &DialogState) -> Result<(), String>;
}

/// Image classifier
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// Classify image bytes against a published model
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError>;
}

/// Downloads attachment content
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, VisionError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<DialogState>, String> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, state: &DialogState) -> Result<(), String> {
        (**self).put(key, state).await
    }
}

#[async_trait]
impl<T: VisionClassifier + ?Sized> VisionClassifier for Arc<T> {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        (**self).classify(project, image).await
    }
}

#[async_trait]
impl<T: AttachmentFetcher + ?Sized> AttachmentFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, VisionError> {
        (**self).fetch(url).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;
use crate::vision::{AttachmentClient, VisionService};
use std::sync::Arc;

/// Adapter to use Database as `ConversationStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStore {
    async fn get(&self, key: &str) -> Result<Option<DialogState>, String> {
        self.db.get_state(key).map_err(|e| e.to_string())
    }

    async fn put(&self, key: &str, state: &DialogState) -> Result<(), String> {
        self.db.put_state(key, state).map_err(|e| e.to_string())
    }
}

/// Adapter to use a `VisionService` as `VisionClassifier`
pub struct CustomVisionClassifier {
    service: Arc<dyn VisionService>,
}

impl CustomVisionClassifier {
    pub fn new(service: Arc<dyn VisionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl VisionClassifier for CustomVisionClassifier {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        self.service.classify(project, image).await
    }
}

/// Adapter to use `AttachmentClient` as `AttachmentFetcher`
pub struct HttpAttachmentFetcher {
    client: AttachmentClient,
}

impl HttpAttachmentFetcher {
    pub fn new(client: AttachmentClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, VisionError> {
        self.client.download(url).await
    }
}
