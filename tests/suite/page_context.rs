//! A page context watching an HTML snapshot, wired to a real orchestrator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use becwatch_engine::{
    FileStateStore, HtmlSnapshotSource, LatestBanner, OverlapPolicy, PageContext, PageEvent,
    PageSelectors, PersistedState, RiskTier, RuntimeMessage, StateStore, Timing,
};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use wiremock::MockServer;

use crate::common::{WIRE_BODY, gmail_page, harness, mount_verdict};

fn quick_timing() -> Timing {
    Timing {
        debounce: Duration::from_millis(50),
        initial_delay: Duration::from_millis(20),
        overlap: OverlapPolicy::ReplacePending,
    }
}

/// Poll the store until `done` holds for the saved state.
async fn wait_for_state(
    store: &FileStateStore,
    done: impl Fn(&PersistedState) -> bool,
) -> PersistedState {
    timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(Some(state)) = store.load()
                && done(&state)
            {
                return state;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("state was never written")
}

fn write_page(path: &Path, subject: &str, body: &str) {
    std::fs::write(path, gmail_page(subject, body)).unwrap();
}

#[tokio::test]
async fn opened_email_is_classified_and_bannered() {
    let server = MockServer::start().await;
    mount_verdict(&server, 6, "Payment redirection").await;
    let h = harness(&server, Some("AIzaTestKey123"));
    let mut messages = h.bus.subscribe();

    let page = h.dir.path().join("inbox.html");
    write_page(&page, "Urgent payment change", WIRE_BODY);
    let source = HtmlSnapshotSource::new(&page, PageSelectors::gmail().unwrap());
    let context = PageContext::new(
        source,
        LatestBanner::default(),
        Arc::clone(&h.orchestrator),
        quick_timing(),
    );
    let (tx, rx) = mpsc::channel(8);

    let drive = async {
        let state = wait_for_state(&h.store, |_| true).await;
        tx.send(PageEvent::Shutdown).await.unwrap();
        state
    };
    let (banner, state) = tokio::join!(context.run(rx), drive);

    assert_eq!(state.last_email.subject, "Urgent payment change");
    assert_eq!(state.last_score, 8);

    let shown = banner.current().unwrap();
    assert_eq!(shown.tier, RiskTier::High);
    assert_eq!(shown.title(), "HIGH RISK DETECTED (Score: 8/10)");
    assert_eq!(banner.shown(), 1);
    h.orchestrator.flush_notifications().await;
    assert_eq!(h.notifier.sent(), 1);

    match messages.recv().await.unwrap() {
        RuntimeMessage::NewEmailDetected { subject, .. } => {
            assert_eq!(subject, "Urgent payment change");
        }
        other => panic!("expected detection first, got {other:?}"),
    }
    assert!(matches!(
        messages.recv().await.unwrap(),
        RuntimeMessage::EmailAnalysisComplete(_)
    ));
}

#[tokio::test]
async fn navigation_to_another_email_triggers_a_new_cycle() {
    let server = MockServer::start().await;
    mount_verdict(&server, 1, "Routine").await;
    let h = harness(&server, Some("AIzaTestKey123"));

    let page = h.dir.path().join("inbox.html");
    write_page(&page, "Lunch plans", "See you at noon.");
    let source = HtmlSnapshotSource::new(&page, PageSelectors::gmail().unwrap());
    let context = PageContext::new(
        source,
        LatestBanner::default(),
        Arc::clone(&h.orchestrator),
        quick_timing(),
    );
    let (tx, rx) = mpsc::channel(8);

    let drive = async {
        wait_for_state(&h.store, |s| s.last_email.subject == "Lunch plans").await;

        // Same email again: no second request.
        tx.send(PageEvent::Mutation { qualifying: true }).await.unwrap();
        sleep(Duration::from_millis(150)).await;
        let after_repeat = server.received_requests().await.unwrap().len();

        write_page(&page, "Quarterly report", "Numbers attached for review.");
        tx.send(PageEvent::Mutation { qualifying: false }).await.unwrap();
        sleep(Duration::from_millis(150)).await;
        let after_unrelated = server.received_requests().await.unwrap().len();

        tx.send(PageEvent::Mutation { qualifying: true }).await.unwrap();
        let state =
            wait_for_state(&h.store, |s| s.last_email.subject == "Quarterly report").await;
        tx.send(PageEvent::Shutdown).await.unwrap();
        (after_repeat, after_unrelated, state)
    };
    let (banner, (after_repeat, after_unrelated, state)) = tokio::join!(context.run(rx), drive);

    assert_eq!(after_repeat, 1);
    assert_eq!(after_unrelated, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(state.last_score, 1);
    // Low risk never puts up a banner.
    assert!(banner.current().is_none());
    assert_eq!(h.notifier.sent(), 0);
}
