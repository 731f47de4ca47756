//! A popup in another process following a live cycle through the message log.

use std::time::Duration;

use becwatch_engine::{
    Email, FileStateStore, MessageLog, MessageTail, PopupFeed, PopupUpdate, RuntimeMessage,
    TriggerTarget,
};
use becwatch_tui::{PopupApp, draw_popup};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tokio::time::{sleep, timeout};
use wiremock::MockServer;

use crate::common::{WIRE_BODY, harness, mount_verdict};

fn screen(app: &PopupApp) -> String {
    let mut terminal = Terminal::new(TestBackend::new(70, 16)).unwrap();
    terminal.draw(|frame| draw_popup(frame, app)).unwrap();
    let buffer = terminal.backend().buffer();
    let area = buffer.area;
    let mut out = String::new();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

/// Poll the feed, applying every update, until one satisfies `done`.
async fn follow_until(
    feed: &mut PopupFeed,
    app: &mut PopupApp,
    done: impl Fn(&PopupUpdate) -> bool,
) {
    timeout(Duration::from_secs(10), async {
        loop {
            let mut finished = false;
            for update in feed.poll() {
                finished |= done(&update);
                app.apply(update);
            }
            if finished {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("popup never saw the update");
}

#[tokio::test]
async fn live_detection_reaches_a_running_popup() {
    let server = MockServer::start().await;
    mount_verdict(&server, 6, "Payment redirection").await;
    let h = harness(&server, Some("AIzaTestKey123"));
    let log_path = h.dir.path().join("messages.jsonl");

    // Popup side: its own view of the state file and the log.
    let mut feed = PopupFeed::new(
        FileStateStore::new(h.store.path()),
        Some(MessageTail::from_end(&log_path)),
    );
    let mut app = PopupApp::new(false);
    app.load(feed.load());
    assert!(screen(&app).contains("No score available"));

    // Watch side: bus broadcasts appended to the log.
    let log = MessageLog::open(&log_path).await.unwrap();
    let relay = tokio::spawn(log.relay(h.bus.subscribe()));

    let email = Email::new("Urgent payment change", WIRE_BODY);
    h.orchestrator.announce(RuntimeMessage::detected(&email));
    follow_until(&mut feed, &mut app, |update| {
        matches!(
            update,
            PopupUpdate::Message(RuntimeMessage::NewEmailDetected { .. })
        )
    })
    .await;

    let analyzing = screen(&app);
    assert!(analyzing.contains("Urgent payment change"), "{analyzing}");
    assert!(analyzing.contains("Analyzing..."), "{analyzing}");

    let response = h.orchestrator.trigger(email).await;
    assert!(response.success, "{response:?}");
    follow_until(&mut feed, &mut app, |update| {
        matches!(
            update,
            PopupUpdate::Message(RuntimeMessage::EmailAnalysisComplete(_))
        )
    })
    .await;

    let scored = screen(&app);
    assert!(scored.contains("Score: 8/10"), "{scored}");
    assert!(!scored.contains("Analyzing..."), "{scored}");

    relay.abort();
}

#[tokio::test]
async fn popup_without_a_log_still_follows_the_state_file() {
    let server = MockServer::start().await;
    mount_verdict(&server, 1, "Routine").await;
    let h = harness(&server, Some("AIzaTestKey123"));

    let mut feed = PopupFeed::new(
        FileStateStore::new(h.store.path()),
        Some(MessageTail::from_end(h.dir.path().join("messages.jsonl"))),
    );
    let mut app = PopupApp::new(false);
    app.load(feed.load());
    assert!(feed.poll().is_empty());

    let response = h
        .orchestrator
        .trigger(Email::new("Lunch plans", "See you at noon."))
        .await;
    assert!(response.success, "{response:?}");

    follow_until(&mut feed, &mut app, |update| {
        matches!(update, PopupUpdate::Reloaded(Ok(Some(_))))
    })
    .await;
    let shown = screen(&app);
    assert!(shown.contains("Lunch plans"), "{shown}");
    assert!(shown.contains("Score: 1/10 - Routine"), "{shown}");
}
