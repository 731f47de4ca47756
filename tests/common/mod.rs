//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use becwatch_engine::becwatch_providers::retry::RetryConfig;
use becwatch_engine::{
    ApiKey, DesktopNotification, FileStateStore, GeminiClassifier, GeminiConfig, MessageBus,
    Notifier, NotifyError, Orchestrator,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MODEL_PATH: &str = "/models/gemini-2.5-flash:generateContent";

/// Body of the documented end-to-end example: two urgency phrases.
pub const WIRE_BODY: &str = "Hi, please wire $10,000 urgently to the account below. \
Wire transfer must complete today. Questions to cfo@corp.example or 555-123-4567.";

/// GenerateContent response whose candidate text is `text`.
pub fn candidate_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP"
        }]
    })
}

/// Mount a verdict the way the model usually answers: fenced JSON.
pub async fn mount_verdict(server: &MockServer, score: u8, reason: &str) {
    let text = format!("```json\n{{\"score\": {score}, \"reason\": \"{reason}\"}}\n```");
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(&text)))
        .mount(server)
        .await;
}

/// Classifier against the mock server with millisecond backoff.
pub fn classifier(server: &MockServer) -> GeminiClassifier {
    GeminiClassifier::with_client(
        reqwest::Client::new(),
        GeminiConfig {
            base_url: server.uri(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
                max_jitter: Duration::ZERO,
            },
            request_timeout: Duration::from_secs(5),
            ..GeminiConfig::default()
        },
    )
}

/// Gmail-shaped page around `subject` and `body`.
pub fn gmail_page(subject: &str, body: &str) -> String {
    let paragraphs: String = body
        .split('\n')
        .map(|line| format!("<p>{line}</p>"))
        .collect();
    format!(
        r#"<html><head><title>Inbox</title><script>boot()</script></head>
<body>
  <div role="navigation">Inbox Starred Sent</div>
  <div role="tabpanel">
    <h2 class="hP">{subject}</h2>
    <div class="a3s aiL">{paragraphs}</div>
  </div>
</body></html>"#
    )
}

/// Records notifications instead of showing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    titles: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> usize {
        self.titles.lock().unwrap().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        self.titles
            .lock()
            .unwrap()
            .push(notification.title.clone());
        Ok(())
    }
}

pub type TestOrchestrator =
    Orchestrator<GeminiClassifier, FileStateStore, Option<ApiKey>, RecordingNotifier>;

pub struct Harness {
    pub orchestrator: Arc<TestOrchestrator>,
    pub notifier: RecordingNotifier,
    pub store: Arc<FileStateStore>,
    pub bus: MessageBus,
    pub dir: tempfile::TempDir,
}

/// Orchestrator over the mock server with a temp state file.
pub fn harness(server: &MockServer, key: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStateStore::new(dir.path().join("state.json")));
    let notifier = RecordingNotifier::default();
    let bus = MessageBus::new();
    let orchestrator = Arc::new(Orchestrator::new(
        classifier(server),
        Arc::clone(&store),
        key.map(|k| ApiKey::new(k).unwrap()),
        notifier.clone(),
        bus.clone(),
    ));
    Harness {
        orchestrator,
        notifier,
        store,
        bus,
        dir,
    }
}
