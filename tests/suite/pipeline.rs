//! Full classification cycles against a mocked GenerateContent endpoint.

use becwatch_engine::{
    Email, PopupView, RiskTier, RuntimeMessage, ScoreLine, StateStore, TriggerResponse,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{MODEL_PATH, WIRE_BODY, candidate_body, harness, mount_verdict};

const TEST_KEY: &str = "AIzaTestKey123";

fn wire_email() -> Email {
    Email::new("Urgent payment change", WIRE_BODY)
}

fn sent_prompt(request: &wiremock::Request) -> String {
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn wire_request_scores_high_and_persists() {
    let server = MockServer::start().await;
    mount_verdict(&server, 6, "Payment redirection").await;
    let h = harness(&server, Some(TEST_KEY));
    let mut messages = h.bus.subscribe();

    let response = h.orchestrator.handle_new_email(wire_email()).await;

    assert!(response.success, "{response:?}");
    let analysis = response.analysis.unwrap();
    assert_eq!(analysis.score, 8);
    assert_eq!(
        analysis.reason,
        "Payment redirection (Local Flags: Contains urgency keywords)"
    );
    assert_eq!(analysis.tier(), RiskTier::High);

    let state = h.store.load().unwrap().unwrap();
    assert_eq!(state.last_score, 8);
    assert_eq!(state.last_email, wire_email());

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(h.store.path()).unwrap()).unwrap();
    assert_eq!(raw["lastScore"], 8);
    assert!(raw["lastUpdated"].is_i64());

    h.orchestrator.flush_notifications().await;
    assert_eq!(h.notifier.sent(), 1);
    assert_eq!(
        h.notifier.titles(),
        ["⚠️ High-Risk Email Detected! (Score: 8/10)"]
    );

    match messages.try_recv().unwrap() {
        RuntimeMessage::EmailAnalysisComplete(published) => assert_eq!(published, analysis),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn outbound_request_is_redacted_and_keyed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", TEST_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate_body(r#"{"score": 6, "reason": "Payment redirection"}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server, Some(TEST_KEY));

    let response = h.orchestrator.handle_new_email(wire_email()).await;
    assert!(response.success, "{response:?}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let prompt = sent_prompt(&requests[0]);
    assert!(prompt.contains("Subject: Urgent payment change"));
    assert!(prompt.contains("[EMAIL_REDACTED]"));
    assert!(prompt.contains("[PHONE_REDACTED]"));
    assert!(!prompt.contains("cfo@corp.example"));
    assert!(!prompt.contains("555-123-4567"));

    // The persisted copy is the original text.
    let state = h.store.load().unwrap().unwrap();
    assert!(state.last_email.body.contains("cfo@corp.example"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_verdict(&server, 2, "Routine request").await;
    let h = harness(&server, Some(TEST_KEY));

    let response = h
        .orchestrator
        .handle_new_email(Email::new("Lunch", "See you at noon."))
        .await;

    assert!(response.success, "{response:?}");
    assert_eq!(response.analysis.unwrap().score, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(h.notifier.sent(), 0);
}

#[tokio::test]
async fn exhausted_retries_fail_without_persisting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let h = harness(&server, Some(TEST_KEY));

    let response = h.orchestrator.handle_new_email(wire_email()).await;

    assert!(!response.success);
    assert!(response.error.unwrap().contains("3 attempts"));
    assert!(h.store.load().unwrap().is_none());
    assert_eq!(h.notifier.sent(), 0);
}

#[tokio::test]
async fn rejected_request_keeps_previous_state() {
    let server = MockServer::start().await;
    mount_verdict(&server, 1, "Newsletter").await;
    let h = harness(&server, Some(TEST_KEY));
    let first = h
        .orchestrator
        .handle_new_email(Email::new("Weekly digest", "Top stories this week."))
        .await;
    assert!(first.success);

    server.reset().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(format!("API key {TEST_KEY} not valid")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = h.orchestrator.handle_new_email(wire_email()).await;

    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(error.contains("400"), "{error}");
    assert!(!error.contains(TEST_KEY), "{error}");

    let state = h.store.load().unwrap().unwrap();
    assert_eq!(state.last_email.subject, "Weekly digest");
    assert_eq!(state.last_score, 1);
}

#[tokio::test]
async fn unparseable_verdict_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate_body("I cannot assess this email.")),
        )
        .mount(&server)
        .await;
    let h = harness(&server, Some(TEST_KEY));

    let response = h.orchestrator.handle_new_email(wire_email()).await;

    assert!(!response.success);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn missing_key_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = harness(&server, None);

    let response = h.orchestrator.handle_new_email(wire_email()).await;

    assert_eq!(
        response,
        TriggerResponse::failure(
            "API Key not found. Run `becwatch set-key <KEY>` to configure one."
        )
    );
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn popup_reads_the_persisted_cycle() {
    let server = MockServer::start().await;
    mount_verdict(&server, 6, "Payment redirection").await;
    let h = harness(&server, Some(TEST_KEY));
    assert!(h.orchestrator.handle_new_email(wire_email()).await.success);

    let mut view = PopupView::default();
    view.apply_load(h.store.load());

    assert_eq!(view.subject, "Urgent payment change");
    assert_eq!(view.body, WIRE_BODY);
    assert_eq!(
        view.score,
        ScoreLine::Scored {
            score: 8,
            reason: "Payment redirection (Local Flags: Contains urgency keywords)".into(),
        }
    );
    assert_eq!(
        view.score.to_string(),
        "Score: 8/10 - Payment redirection (Local Flags: Contains urgency keywords)"
    );
    assert!(view.last_updated.is_some());
    assert_ne!(view.updated_line(), "Last updated: Never updated");
}
