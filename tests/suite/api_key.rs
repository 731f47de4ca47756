//! Saving the API key and picking it up in running cycles.

use std::sync::Arc;

use becwatch_config::{BecwatchConfig, persist_api_key_to};
use becwatch_engine::{
    ApiKey, ApiKeySource, ConfigKeySource, Email, FileStateStore, MessageBus, Orchestrator,
};
use wiremock::matchers::query_param;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{RecordingNotifier, candidate_body, classifier};

#[test]
fn saved_key_survives_existing_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "# local tweaks\n[detector]\ndebounce_ms = 250\n\n[api_keys]\ngoogle = \"old\"\n",
    )
    .unwrap();

    persist_api_key_to(&path, &ApiKey::new("AIzaNewKey").unwrap()).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("# local tweaks"));
    let config = BecwatchConfig::load_from(&path).unwrap().unwrap();
    assert_eq!(config.detector().debounce_ms(), 250);
    assert_eq!(
        ConfigKeySource::at(&path).api_key().unwrap().expose_secret(),
        "AIzaNewKey"
    );
}

#[test]
fn blank_key_is_rejected_before_saving() {
    assert!(ApiKey::new("").is_err());
    assert!(ApiKey::new("   ").is_err());
}

#[tokio::test]
async fn rotated_key_is_used_without_restart() {
    let server = MockServer::start().await;
    for key in ["AIzaFirst", "AIzaSecond"] {
        Mock::given(query_param("key", key))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"score": 1, "reason": "Routine"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let store = Arc::new(FileStateStore::new(dir.path().join("state.json")));
    let orchestrator = Orchestrator::new(
        classifier(&server),
        Arc::clone(&store),
        ConfigKeySource::at(&config_path),
        RecordingNotifier::default(),
        MessageBus::new(),
    );

    if std::env::var("GEMINI_API_KEY").is_err() {
        let response = orchestrator
            .handle_new_email(Email::new("Hello", "First message."))
            .await;
        assert!(!response.success);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    persist_api_key_to(&config_path, &ApiKey::new("AIzaFirst").unwrap()).unwrap();
    let first = orchestrator
        .handle_new_email(Email::new("Hello", "First message."))
        .await;
    assert!(first.success, "{first:?}");

    persist_api_key_to(&config_path, &ApiKey::new("AIzaSecond").unwrap()).unwrap();
    let second = orchestrator
        .handle_new_email(Email::new("Hello again", "Second message."))
        .await;
    assert!(second.success, "{second:?}");

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
