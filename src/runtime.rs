//! Runtime for executing conversations
//!
//! Each conversation gets an actor task that owns its dialog state and
//! processes turns in arrival order. Distinct conversations run in parallel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, DEFAULT_CLASSIFY_TIMEOUT, DEFAULT_IDLE_TIMEOUT};
pub use traits::*;

use crate::dialog::{BotMessage, Event, FlowRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Runtime over shared trait objects, as built by the manager
pub type SharedRuntime = ConversationRuntime<
    Arc<dyn ConversationStore>,
    Arc<dyn VisionClassifier>,
    Arc<dyn AttachmentFetcher>,
>;

/// One inbound activity waiting to be processed
pub struct TurnRequest {
    pub event: Event,
    /// Cancelled when the HTTP caller goes away
    pub cancel: CancellationToken,
    pub reply: oneshot::Sender<Result<Vec<BotMessage>, String>>,
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub turn_tx: mpsc::Sender<TurnRequest>,
}

/// Manager for all conversation runtimes
pub struct RuntimeManager {
    store: Arc<dyn ConversationStore>,
    classifier: Arc<dyn VisionClassifier>,
    fetcher: Arc<dyn AttachmentFetcher>,
    registry: Arc<FlowRegistry>,
    classify_timeout: Duration,
    idle_timeout: Duration,
    runtimes: RwLock<HashMap<String, ConversationHandle>>,
}

impl RuntimeManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        classifier: Arc<dyn VisionClassifier>,
        fetcher: Arc<dyn AttachmentFetcher>,
        registry: FlowRegistry,
    ) -> Self {
        Self {
            store,
            classifier,
            fetcher,
            registry: Arc::new(registry),
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// How long a conversation's actor waits for a turn before stopping.
    /// The next turn starts a fresh actor from the stored state.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Get or create a runtime for a conversation
    pub async fn get_or_create(&self, key: &str) -> Result<ConversationHandle, String> {
        // Check if already running
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(key) {
                if !handle.turn_tx.is_closed() {
                    return Ok(handle.clone());
                }
            }
        }

        // Load outside the lock so a slow store only delays this conversation
        let state = self.store.get(key).await?.unwrap_or_default();
        tracing::debug!(key, depth = state.stack.len(), "Loaded conversation state");

        let mut runtimes = self.runtimes.write().await;

        // Drop handles of actors that stopped after going idle
        runtimes.retain(|_, handle| !handle.turn_tx.is_closed());

        // Another request may have started it while we were loading
        if let Some(handle) = runtimes.get(key) {
            return Ok(handle.clone());
        }

        let (turn_tx, turn_rx) = mpsc::channel(32);
        let runtime: SharedRuntime = ConversationRuntime::new(
            key.to_string(),
            state,
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&self.classifier),
            Arc::clone(&self.fetcher),
            turn_rx,
        )
        .with_classify_timeout(self.classify_timeout)
        .with_idle_timeout(self.idle_timeout);

        let conv_key = key.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(key = %conv_key, "Conversation runtime finished");
        });

        let handle = ConversationHandle { turn_tx };
        runtimes.insert(key.to_string(), handle.clone());
        tracing::info!(key, runtimes = runtimes.len(), "Started conversation runtime");
        Ok(handle)
    }

    /// Run one event through a conversation and collect the bot's replies
    pub async fn submit_turn(
        &self,
        key: &str,
        event: Event,
        cancel: CancellationToken,
    ) -> Result<Vec<BotMessage>, String> {
        let (reply, reply_rx) = oneshot::channel();
        let mut request = TurnRequest {
            event,
            cancel,
            reply,
        };

        // An actor that just went idle closes its channel; start a new one once
        let mut restarted = false;
        loop {
            let handle = self.get_or_create(key).await?;
            match handle.turn_tx.send(request).await {
                Ok(()) => break,
                Err(mpsc::error::SendError(returned)) if !restarted => {
                    tracing::debug!(key, "Conversation runtime closed, restarting");
                    request = returned;
                    restarted = true;
                }
                Err(e) => return Err(format!("Failed to send turn: {e}")),
            }
        }

        reply_rx
            .await
            .map_err(|e| format!("Conversation runtime dropped the turn: {e}"))?
    }
}
