//! Conversation runtime executor

use super::traits::{AttachmentFetcher, ConversationStore, VisionClassifier};
use super::TurnRequest;

use crate::dialog::{transition, BotMessage, DialogState, Effect, Event, FlowRegistry};
use crate::vision::{ClassificationProject, VisionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default deadline for a single classify call
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time without turns before a conversation's actor stops
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Generic conversation runtime that can work with any store, classifier
/// and fetcher implementations
pub struct ConversationRuntime<S, C, F>
where
    S: ConversationStore + 'static,
    C: VisionClassifier + 'static,
    F: AttachmentFetcher + 'static,
{
    key: String,
    state: DialogState,
    registry: Arc<FlowRegistry>,
    store: S,
    classifier: C,
    fetcher: F,
    classify_timeout: Duration,
    idle_timeout: Duration,
    turn_rx: mpsc::Receiver<TurnRequest>,
}

impl<S, C, F> ConversationRuntime<S, C, F>
where
    S: ConversationStore + 'static,
    C: VisionClassifier + 'static,
    F: AttachmentFetcher + 'static,
{
    pub fn new(
        key: String,
        state: DialogState,
        registry: Arc<FlowRegistry>,
        store: S,
        classifier: C,
        fetcher: F,
        turn_rx: mpsc::Receiver<TurnRequest>,
    ) -> Self {
        Self {
            key,
            state,
            registry,
            store,
            classifier,
            fetcher,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            turn_rx,
        }
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Process turns one at a time until every sender is gone or the
    /// conversation goes idle. An idle actor closes its channel first and
    /// still answers turns that were already queued; the state it leaves
    /// behind is the persisted one.
    pub async fn run(mut self) {
        tracing::info!(key = %self.key, depth = self.state.stack.len(), "Starting conversation runtime");

        loop {
            match tokio::time::timeout(self.idle_timeout, self.turn_rx.recv()).await {
                Ok(Some(request)) => self.handle_request(request).await,
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!(key = %self.key, "Conversation idle, closing runtime");
                    self.turn_rx.close();
                }
            }
        }

        tracing::info!(key = %self.key, "Conversation runtime stopped");
    }

    async fn handle_request(&mut self, request: TurnRequest) {
        let TurnRequest {
            event,
            cancel,
            reply,
        } = request;

        let kind = event.kind();
        let result = self.process_turn(event, &cancel).await;

        match &result {
            Ok(messages) => {
                tracing::debug!(
                    key = %self.key,
                    event = kind,
                    replies = messages.len(),
                    status = ?self.state.turn_status(),
                    "Turn complete"
                );
            }
            Err(e) => {
                tracing::error!(key = %self.key, event = kind, error = %e, "Turn failed");
            }
        }

        if reply.send(result).is_err() {
            tracing::debug!(key = %self.key, "Turn caller went away before the reply");
        }
    }

    /// Run one inbound event to completion. On failure the in-memory state
    /// goes back to what it was before the turn, matching what was last
    /// persisted.
    pub async fn process_turn(
        &mut self,
        event: Event,
        cancel: &CancellationToken,
    ) -> Result<Vec<BotMessage>, String> {
        let snapshot = self.state.clone();
        let result = self.run_transitions(event, cancel).await;
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    async fn run_transitions(
        &mut self,
        event: Event,
        cancel: &CancellationToken,
    ) -> Result<Vec<BotMessage>, String> {
        let mut outbox = Vec::new();

        // Effects can generate follow-up events; loop instead of recursing
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = transition(&self.state, &self.registry, current_event)
                .map_err(|e| e.to_string())?;

            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, cancel, &mut outbox).await? {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(outbox)
    }

    async fn execute_effect(
        &self,
        effect: Effect,
        cancel: &CancellationToken,
        outbox: &mut Vec<BotMessage>,
    ) -> Result<Option<Event>, String> {
        match effect {
            Effect::Send(message) => {
                outbox.push(message);
                Ok(None)
            }

            Effect::PersistState => {
                self.store.put(&self.key, &self.state).await?;
                Ok(None)
            }

            Effect::ClassifyImage {
                content_url,
                project,
            } => Ok(Some(self.classify(&content_url, &project, cancel).await)),

            Effect::RecordTrainingSample { label, image } => {
                // TODO: upload tagged images with the training key once retraining is enabled
                tracing::info!(
                    key = %self.key,
                    label = %label,
                    image_bytes = image.len(),
                    "Training sample received"
                );
                Ok(None)
            }
        }
    }

    /// Fetch and classify an attachment, racing the turn's cancellation.
    /// Every failure becomes a `ClassificationFailed` event.
    async fn classify(
        &self,
        content_url: &str,
        project: &ClassificationProject,
        cancel: &CancellationToken,
    ) -> Event {
        let work = async {
            let image = self.fetcher.fetch(content_url).await?;
            let predictions = tokio::time::timeout(
                self.classify_timeout,
                self.classifier.classify(project, &image),
            )
            .await
            .map_err(|_| {
                VisionError::timeout(format!(
                    "Classification took longer than {}s",
                    self.classify_timeout.as_secs_f64()
                ))
            })??;
            Ok::<_, VisionError>((predictions, image))
        };

        let outcome = tokio::select! {
            result = work => result,
            () = cancel.cancelled() => Err(VisionError::cancelled("Turn cancelled by caller")),
        };

        match outcome {
            Ok((predictions, image)) => Event::ClassificationComplete { predictions, image },
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    kind = ?e.kind,
                    transient = e.kind.is_transient(),
                    error = %e,
                    "Attachment classification failed"
                );
                Event::ClassificationFailed {
                    message: e.to_string(),
                }
            }
        }
    }
}
