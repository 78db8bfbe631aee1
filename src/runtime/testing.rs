//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::dialog::DialogState;
use crate::vision::{ClassificationProject, Prediction, VisionError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory conversation store for testing
#[derive(Default)]
pub struct InMemoryStore {
    states: Mutex<HashMap<String, DialogState>>,
    puts: Mutex<usize>,
    fail_puts: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation's state
    pub fn with_state(self, key: &str, state: DialogState) -> Self {
        self.states.lock().unwrap().insert(key.to_string(), state);
        self
    }

    pub fn state(&self, key: &str) -> Option<DialogState> {
        self.states.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }

    /// Make every following put fail
    pub fn fail_puts(&self, fail: bool) {
        *self.fail_puts.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<DialogState>, String> {
        Ok(self.state(key))
    }

    async fn put(&self, key: &str, state: &DialogState) -> Result<(), String> {
        if *self.fail_puts.lock().unwrap() {
            return Err("store unavailable".to_string());
        }
        *self.puts.lock().unwrap() += 1;
        self.states
            .lock()
            .unwrap()
            .insert(key.to_string(), state.clone());
        Ok(())
    }
}

// ============================================================================
// Mock Classifier
// ============================================================================

/// Mock classifier that returns queued responses
#[derive(Default)]
pub struct MockClassifier {
    responses: Mutex<VecDeque<Result<Vec<Prediction>, VisionError>>>,
    /// Record of (published name, image) per call
    pub requests: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn queue_predictions(&self, predictions: &[(&str, f64)]) {
        let predictions = predictions
            .iter()
            .map(|(label, probability)| Prediction {
                label: (*label).to_string(),
                probability: *probability,
            })
            .collect();
        self.responses.lock().unwrap().push_back(Ok(predictions));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: VisionError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, Vec<u8>)> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<Vec<Prediction>, VisionError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VisionError::unknown("No mock response queued")))
    }
}

#[async_trait]
impl VisionClassifier for MockClassifier {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        self.requests
            .lock()
            .unwrap()
            .push((project.published_name.clone(), image.to_vec()));
        self.next_response()
    }
}

// ============================================================================
// Delayed Mock Classifier (for timeout and cancellation testing)
// ============================================================================

/// Mock classifier that sleeps before answering
pub struct DelayedMockClassifier {
    inner: MockClassifier,
    delay: Duration,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl DelayedMockClassifier {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockClassifier::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_predictions(&self, predictions: &[(&str, f64)]) {
        self.inner.queue_predictions(predictions);
    }
}

#[async_trait]
impl VisionClassifier for DelayedMockClassifier {
    async fn classify(
        &self,
        project: &ClassificationProject,
        image: &[u8],
    ) -> Result<Vec<Prediction>, VisionError> {
        self.inner
            .requests
            .lock()
            .unwrap()
            .push((project.published_name.clone(), image.to_vec()));
        // notify_one keeps a permit, so a late waiter still wakes
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }
}

// ============================================================================
// Mock Fetcher
// ============================================================================

/// Serves fixed bytes per URL; unknown URLs fail like a 404
#[derive(Default)]
pub struct MockFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl AttachmentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, VisionError> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| VisionError::fetch(format!("Attachment download returned HTTP 404 for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::flows::test_support::registry;
    use crate::dialog::state::{CarRecognitionStep, MainMenuStep, Skill};
    use crate::dialog::{Attachment, BotMessage, Event, Frame, APOLOGY};
    use crate::runtime::RuntimeManager;
    use tokio_util::sync::CancellationToken;

    const KEY: &str = "emulator/conversations/c1";
    const CAR_URL: &str = "https://example.test/car.jpg";
    const CAR_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0];
    const CAR_PROMPT: &str = "I can recognize car model. Could you upload a photo of a car? Type :q whenever you want to exit this skill.";

    fn texts(messages: &[BotMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    fn car_upload() -> Event {
        Event::attachments(vec![Attachment::new("image/jpeg", CAR_URL)])
    }

    fn awaiting_car(is_in_loop: bool) -> DialogState {
        DialogState::new(vec![
            Frame::MainMenu {
                is_repeater: false,
                step: MainMenuStep::AwaitingSkill {
                    skill: Skill::CarRecognition,
                },
            },
            Frame::CarRecognition {
                step: CarRecognitionStep::AwaitingAttachment { is_in_loop },
            },
        ])
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        manager: RuntimeManager,
    }

    impl Harness {
        fn new(store: InMemoryStore, classifier: Arc<dyn VisionClassifier>) -> Self {
            let store = Arc::new(store);
            let fetcher = Arc::new(MockFetcher::new().with_file(CAR_URL, CAR_BYTES));
            let manager = RuntimeManager::new(store.clone(), classifier, fetcher, registry());
            Self { store, manager }
        }

        async fn turn(&self, event: Event) -> Result<Vec<BotMessage>, String> {
            self.manager
                .submit_turn(KEY, event, CancellationToken::new())
                .await
        }
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", &awaiting_car(true)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(awaiting_car(true)));
        assert_eq!(store.put_count(), 1);

        store.fail_puts(true);
        assert!(store.put("k", &DialogState::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_classifier_runs_dry() {
        let classifier = MockClassifier::new();
        classifier.queue_predictions(&[("Mustang", 0.9)]);
        let project = registry().car_recognition().project.clone();

        assert_eq!(classifier.classify(&project, CAR_BYTES).await.unwrap().len(), 1);
        assert!(classifier.classify(&project, CAR_BYTES).await.is_err());
        assert_eq!(classifier.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_welcome_then_echo() {
        let harness = Harness::new(InMemoryStore::new(), Arc::new(MockClassifier::new()));

        let welcome = harness.turn(Event::MembersAdded).await.unwrap();
        assert_eq!(welcome.len(), 1);
        assert_eq!(welcome[0].suggested_actions, vec!["Echo", "Car Recognition"]);

        harness.turn(Event::text("Echo")).await.unwrap();
        let echoed = harness.turn(Event::text("hello")).await.unwrap();
        assert_eq!(texts(&echoed), vec!["hello"]);

        let active = harness.store.state(KEY).and_then(|s| s.active().cloned());
        assert_eq!(active, Some(Frame::Echo { is_in_loop: true }));
    }

    #[tokio::test]
    async fn test_state_is_loaded_from_store() {
        let store = InMemoryStore::new().with_state(
            KEY,
            DialogState::new(vec![Frame::Echo { is_in_loop: true }]),
        );
        let harness = Harness::new(store, Arc::new(MockClassifier::new()));

        let replies = harness.turn(Event::text("still here")).await.unwrap();
        assert_eq!(texts(&replies), vec!["still here"]);
    }

    #[tokio::test]
    async fn test_confident_classification() {
        let classifier = Arc::new(MockClassifier::new());
        classifier.queue_predictions(&[("Sedan", 0.3), ("Mustang", 0.91), ("Camaro", 0.99)]);
        let harness = Harness::new(
            InMemoryStore::new().with_state(KEY, awaiting_car(false)),
            classifier.clone(),
        );

        let replies = harness.turn(car_upload()).await.unwrap();
        assert_eq!(texts(&replies), vec!["Wow! Nice Mustang!"]);
        assert_eq!(
            classifier.recorded_requests(),
            vec![("cars-v1".to_string(), CAR_BYTES.to_vec())]
        );
        assert_eq!(harness.store.state(KEY), Some(awaiting_car(true)));
        // Persisted once, after the classification settled
        assert_eq!(harness.store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_unsure_classification_asks_for_label() {
        let classifier = Arc::new(MockClassifier::new());
        classifier.queue_predictions(&[("Mustang", 0.42)]);
        let harness = Harness::new(
            InMemoryStore::new().with_state(KEY, awaiting_car(false)),
            classifier,
        );

        let asked = harness.turn(car_upload()).await.unwrap();
        assert_eq!(
            texts(&asked),
            vec!["I'm not sure what it is. Could you tell me the car model?"]
        );

        let thanked = harness.turn(Event::text("Lada Niva")).await.unwrap();
        assert_eq!(
            texts(&thanked),
            vec![
                "Thank you! I'll keep learning to be able to distingish Lada Niva.",
                CAR_PROMPT,
            ]
        );
        assert_eq!(harness.store.state(KEY), Some(awaiting_car(false)));
    }

    #[tokio::test]
    async fn test_fetch_failure_apologizes() {
        let harness = Harness::new(
            InMemoryStore::new().with_state(KEY, awaiting_car(true)),
            Arc::new(MockClassifier::new()),
        );

        let replies = harness
            .turn(Event::attachments(vec![Attachment::new(
                "image/jpeg",
                "https://example.test/missing.jpg",
            )]))
            .await
            .unwrap();
        assert_eq!(texts(&replies), vec![APOLOGY]);
        assert_eq!(harness.store.state(KEY), Some(awaiting_car(true)));
    }

    #[tokio::test]
    async fn test_classifier_error_apologizes() {
        let classifier = Arc::new(MockClassifier::new());
        classifier.queue_error(VisionError::server_error("Server error: boom"));
        let harness = Harness::new(
            InMemoryStore::new().with_state(KEY, awaiting_car(false)),
            classifier,
        );

        let replies = harness.turn(car_upload()).await.unwrap();
        assert_eq!(texts(&replies), vec![APOLOGY]);
        assert_eq!(harness.store.state(KEY), Some(awaiting_car(false)));
    }

    #[tokio::test]
    async fn test_classification_timeout_apologizes() {
        let classifier = Arc::new(DelayedMockClassifier::new(Duration::from_secs(5)));
        classifier.queue_predictions(&[("Mustang", 0.99)]);
        let store = Arc::new(InMemoryStore::new().with_state(KEY, awaiting_car(false)));
        let manager = RuntimeManager::new(
            store.clone(),
            classifier,
            Arc::new(MockFetcher::new().with_file(CAR_URL, CAR_BYTES)),
            registry(),
        )
        .with_classify_timeout(Duration::from_millis(20));

        let replies = manager
            .submit_turn(KEY, car_upload(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(texts(&replies), vec![APOLOGY]);
        assert_eq!(store.state(KEY), Some(awaiting_car(false)));
    }

    #[tokio::test]
    async fn test_cancelled_turn_restores_attachment_prompt() {
        let classifier = Arc::new(DelayedMockClassifier::new(Duration::from_secs(30)));
        let started = classifier.request_started.clone();
        let store = Arc::new(InMemoryStore::new().with_state(KEY, awaiting_car(true)));
        let manager = Arc::new(RuntimeManager::new(
            store.clone(),
            classifier,
            Arc::new(MockFetcher::new().with_file(CAR_URL, CAR_BYTES)),
            registry(),
        ));

        let cancel = CancellationToken::new();
        let turn = tokio::spawn({
            let manager = manager.clone();
            let cancel = cancel.clone();
            async move { manager.submit_turn(KEY, car_upload(), cancel).await }
        });

        started.notified().await;
        cancel.cancel();

        let replies = turn.await.unwrap().unwrap();
        assert_eq!(texts(&replies), vec![APOLOGY]);
        assert_eq!(store.state(KEY), Some(awaiting_car(true)));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_previous_state() {
        let store = Arc::new(InMemoryStore::new());
        let manager = RuntimeManager::new(
            store.clone(),
            Arc::new(MockClassifier::new()),
            Arc::new(MockFetcher::new()),
            registry(),
        );
        let cancel = CancellationToken::new();

        manager
            .submit_turn(KEY, Event::MembersAdded, cancel.clone())
            .await
            .unwrap();

        store.fail_puts(true);
        assert!(manager
            .submit_turn(KEY, Event::text("Echo"), cancel.clone())
            .await
            .is_err());

        // The failed turn left the menu waiting, as persisted
        store.fail_puts(false);
        let replies = manager
            .submit_turn(KEY, Event::text("Echo"), cancel)
            .await
            .unwrap();
        assert_eq!(
            texts(&replies),
            vec!["I can repeat what you say and type :q whenever you want to exit this skill."]
        );
    }

    async fn live_runtimes(manager: &RuntimeManager) -> usize {
        manager
            .runtimes
            .read()
            .await
            .values()
            .filter(|handle| !handle.turn_tx.is_closed())
            .count()
    }

    #[tokio::test]
    async fn test_idle_runtime_stops_and_resumes_from_store() {
        let store = Arc::new(InMemoryStore::new());
        let manager = RuntimeManager::new(
            store.clone(),
            Arc::new(MockClassifier::new()),
            Arc::new(MockFetcher::new()),
            registry(),
        )
        .with_idle_timeout(Duration::from_millis(20));

        manager
            .submit_turn(KEY, Event::MembersAdded, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(live_runtimes(&manager).await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(live_runtimes(&manager).await, 0);

        // The menu is still waiting for a choice, as persisted
        let replies = manager
            .submit_turn(KEY, Event::text("Echo"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            texts(&replies),
            vec!["I can repeat what you say and type :q whenever you want to exit this skill."]
        );
        assert_eq!(live_runtimes(&manager).await, 1);
    }

    #[tokio::test]
    async fn test_idle_runtimes_are_released() {
        let manager = RuntimeManager::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockClassifier::new()),
            Arc::new(MockFetcher::new()),
            registry(),
        )
        .with_idle_timeout(Duration::from_millis(20));

        for i in 0..50 {
            manager
                .submit_turn(
                    &format!("emulator/conversations/{i}"),
                    Event::MembersAdded,
                    CancellationToken::new(),
                )
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(live_runtimes(&manager).await, 0);

        // Starting another conversation prunes the stopped ones
        manager
            .submit_turn(KEY, Event::MembersAdded, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(manager.runtimes.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = Arc::new(InMemoryStore::new());
        let manager = RuntimeManager::new(
            store.clone(),
            Arc::new(MockClassifier::new()),
            Arc::new(MockFetcher::new()),
            registry(),
        );

        let a = "emulator/conversations/a";
        let b = "emulator/conversations/b";
        manager
            .submit_turn(a, Event::MembersAdded, CancellationToken::new())
            .await
            .unwrap();
        manager
            .submit_turn(a, Event::text("Echo"), CancellationToken::new())
            .await
            .unwrap();

        let replies = manager
            .submit_turn(b, Event::text("Echo"), CancellationToken::new())
            .await
            .unwrap();
        // b has no flow yet, so it gets the menu instead of an echo prompt
        assert!(texts(&replies)[0].starts_with("Hi again."));

        assert_eq!(
            store.state(a).and_then(|s| s.active().cloned()),
            Some(Frame::Echo { is_in_loop: false })
        );
    }
}
