//! `scan` and `watch`: drive the pipeline from a saved webmail page.
//!
//! The page file stands in for the live DOM. `watch` polls its modification
//! time; a change whose container text differs is a qualifying mutation.

use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Result, bail};
use becwatch_config::BecwatchConfig;
use becwatch_engine::{
    Banner, BannerPlacement, BannerSink, EmailSource, HtmlSnapshotSource, MessageBus, PageContext,
    PageEvent, PageSelectors, RuntimeMessage, Timing, TriggerTarget, container_fingerprint,
};
use becwatch_types::sanitize_terminal_text;
use tokio::sync::{broadcast, mpsc};

use crate::runtime;

/// Prints banners for the page being watched.
struct TerminalBanner {
    source: HtmlSnapshotSource,
}

impl BannerSink for TerminalBanner {
    fn replace(&mut self, banner: Banner) {
        let placement = self
            .source
            .read_html()
            .map_or(BannerPlacement::DocumentRoot, |html| {
                BannerPlacement::choose(&html, self.source.selectors())
            });
        if let Err(e) = becwatch_tui::print_banner(&mut stdout(), &banner, placement) {
            tracing::warn!("Failed to print banner: {e}");
        }
    }
}

pub async fn scan(config: &BecwatchConfig, page: &Path) -> Result<()> {
    let source = HtmlSnapshotSource::new(page, runtime::page_selectors(config)?);
    let Some(email) = source.extract_current_email() else {
        println!("No email found in {}", page.display());
        return Ok(());
    };

    let bus = MessageBus::new();
    let relay = runtime::start_relay(config, &bus).await;
    let orchestrator = runtime::orchestrator(config, bus)?;
    orchestrator.announce(RuntimeMessage::detected(&email));
    println!("Analyzing: {}", sanitize_terminal_text(&email.subject));

    let response = orchestrator.trigger(email).await;
    orchestrator.flush_notifications().await;
    drop(orchestrator);
    runtime::finish_relay(relay).await;

    match (response.analysis, response.error) {
        (Some(analysis), _) if response.success => {
            println!(
                "Score: {}/10 - {}",
                analysis.score,
                sanitize_terminal_text(&analysis.reason)
            );
            if let Some(banner) = Banner::for_analysis(&analysis) {
                TerminalBanner { source }.replace(banner);
            }
            Ok(())
        }
        (_, error) => bail!(error.unwrap_or_else(|| "analysis failed".to_string())),
    }
}

pub async fn watch(config: &BecwatchConfig, page: PathBuf, poll: Duration) -> Result<()> {
    let selectors = runtime::page_selectors(config)?;
    let bus = MessageBus::new();
    let relay = runtime::start_relay(config, &bus).await;
    let orchestrator = runtime::orchestrator(config, bus.clone())?;

    let context = PageContext::new(
        HtmlSnapshotSource::new(&page, selectors.clone()),
        TerminalBanner {
            source: HtmlSnapshotSource::new(&page, selectors.clone()),
        },
        Arc::clone(&orchestrator),
        Timing::from_config(config.detector()),
    );

    let (tx, rx) = mpsc::channel(64);
    let poller = SnapshotPoller::new(page.clone(), selectors);
    println!("Watching {} (Ctrl-C to stop)", page.display());
    tracing::info!(page = %page.display(), poll_ms = poll.as_millis() as u64, "Watch started");

    tokio::join!(
        context.run(rx),
        feed_events(poller, poll, tx, bus.subscribe())
    );
    orchestrator.flush_notifications().await;
    drop((orchestrator, bus));
    runtime::finish_relay(relay).await;
    tracing::info!("Watch stopped");
    Ok(())
}

async fn feed_events(
    mut poller: SnapshotPoller,
    poll: Duration,
    tx: mpsc::Sender<PageEvent>,
    mut messages: broadcast::Receiver<RuntimeMessage>,
) {
    let mut ticker = tokio::time::interval(poll);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Some(event) = poller.poll() && tx.send(event).await.is_err() {
                    return;
                }
            }
            message = messages.recv() => match message {
                Ok(RuntimeMessage::NewEmailDetected { subject, .. }) => {
                    println!("Analyzing: {}", sanitize_terminal_text(&subject));
                }
                Ok(RuntimeMessage::EmailAnalysisComplete(analysis)) => {
                    println!(
                        "Score: {}/10 - {}",
                        analysis.score,
                        sanitize_terminal_text(&analysis.reason)
                    );
                }
                Ok(RuntimeMessage::NewEmail(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    let _ = tx.send(PageEvent::Shutdown).await;
}

/// Turns changes to the page file into page events.
#[derive(Debug)]
pub struct SnapshotPoller {
    path: PathBuf,
    selectors: PageSelectors,
    last_modified: Option<SystemTime>,
    last_fingerprint: Option<String>,
}

impl SnapshotPoller {
    /// Seeded with the file as it is now, so only later changes count.
    pub fn new(path: PathBuf, selectors: PageSelectors) -> Self {
        let mut poller = Self {
            path,
            selectors,
            last_modified: None,
            last_fingerprint: None,
        };
        let _ = poller.poll();
        poller
    }

    pub fn poll(&mut self) -> Option<PageEvent> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()?;
        if self.last_modified == Some(modified) {
            return None;
        }
        self.last_modified = Some(modified);

        let html = std::fs::read_to_string(&self.path).ok()?;
        let fingerprint = container_fingerprint(&html, &self.selectors);
        let qualifying = self.last_fingerprint.as_ref() != Some(&fingerprint);
        self.last_fingerprint = Some(fingerprint);
        Some(PageEvent::Mutation { qualifying })
    }
}
