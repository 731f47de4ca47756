//! The page context: one event loop per monitored page.
//!
//! Mutation events arrive from the host. Qualifying bursts are debounced, the
//! current email is extracted, and a new email is handed to the orchestrator
//! on a spawned task while the loop keeps consuming events. A single
//! `tokio::select!` multiplexes page events, the debounce deadline, the
//! one-shot initial check, and the in-flight cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use becwatch_config::DetectorConfig;
use becwatch_providers::Classifier;
use becwatch_types::{Email, OverlapPolicy, RuntimeMessage, TriggerResponse};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::detector::{ChangeDetector, CheckDecision};
use crate::extractor::EmailSource;
use crate::notifications::Notifier;
use crate::orchestrator::Orchestrator;
use crate::presentation::{Banner, BannerSink};
use crate::storage::{ApiKeySource, StateStore};

/// Signals from the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The page changed. Only mutations touching the email container qualify.
    Mutation { qualifying: bool },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub debounce: Duration,
    pub initial_delay: Duration,
    pub overlap: OverlapPolicy,
}

impl Timing {
    #[must_use]
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms()),
            initial_delay: Duration::from_millis(config.initial_delay_ms()),
            overlap: config.overlap,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}

/// Where a page context sends its messages.
pub trait TriggerTarget: Send + Sync + 'static {
    /// Fire-and-forget informational message.
    fn announce(&self, message: RuntimeMessage);

    /// Request/response `NEW_EMAIL` exchange.
    fn trigger(&self, email: Email) -> impl Future<Output = TriggerResponse> + Send;
}

impl<C, S, K, N> TriggerTarget for Orchestrator<C, S, K, N>
where
    C: Classifier + 'static,
    S: StateStore + 'static,
    K: ApiKeySource + 'static,
    N: Notifier + 'static,
{
    fn announce(&self, message: RuntimeMessage) {
        self.bus().publish(message);
    }

    fn trigger(&self, email: Email) -> impl Future<Output = TriggerResponse> + Send {
        self.handle_new_email(email)
    }
}

type Flight = JoinHandle<TriggerResponse>;

pub struct PageContext<E, B, T> {
    source: E,
    banner: B,
    target: Arc<T>,
    detector: ChangeDetector,
    timing: Timing,
}

impl<E, B, T> PageContext<E, B, T>
where
    E: EmailSource,
    B: BannerSink,
    T: TriggerTarget,
{
    pub fn new(source: E, banner: B, target: Arc<T>, timing: Timing) -> Self {
        Self {
            source,
            banner,
            target,
            detector: ChangeDetector::new(timing.overlap),
            timing,
        }
    }

    /// Drive the page until `Shutdown` or the event channel closes.
    ///
    /// A cycle still running at shutdown is awaited, not cancelled. Returns the
    /// banner sink so the host can inspect what was last shown.
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) -> B {
        let initial = tokio::time::sleep(self.timing.initial_delay);
        tokio::pin!(initial);
        let mut initial_done = false;
        let mut deadline: Option<Instant> = None;
        let mut flight: Option<Flight> = None;

        loop {
            tokio::select! {
                () = &mut initial, if !initial_done => {
                    initial_done = true;
                    tracing::debug!("Initial email check");
                    self.check(&mut flight);
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.check(&mut flight);
                }
                joined = join_flight(&mut flight), if flight.is_some() => {
                    flight = None;
                    self.finish_flight(joined);
                    if self.detector.take_pending() {
                        tracing::debug!("Re-running check deferred during flight");
                        self.check(&mut flight);
                    }
                }
                event = events.recv() => match event {
                    Some(PageEvent::Mutation { qualifying: true }) => {
                        deadline = Some(Instant::now() + self.timing.debounce);
                    }
                    Some(PageEvent::Mutation { qualifying: false }) => {}
                    Some(PageEvent::Shutdown) | None => break,
                },
            }
        }

        if flight.is_some() {
            let joined = join_flight(&mut flight).await;
            self.finish_flight(joined);
        }
        self.banner
    }

    fn check(&mut self, flight: &mut Option<Flight>) {
        match self.detector.evaluate(self.source.extract_current_email()) {
            CheckDecision::Skip(reason) => {
                tracing::trace!(?reason, "Check skipped");
            }
            CheckDecision::Dispatch { email, guard } => {
                tracing::info!(subject = %email.subject, "New email detected");
                self.target.announce(RuntimeMessage::detected(&email));
                let target = Arc::clone(&self.target);
                *flight = Some(tokio::spawn(async move {
                    let _guard = guard;
                    target.trigger(email).await
                }));
            }
        }
    }

    fn finish_flight(&mut self, joined: Result<TriggerResponse, JoinError>) {
        match joined {
            Ok(TriggerResponse {
                success: true,
                analysis: Some(analysis),
                ..
            }) => {
                if let Some(banner) = Banner::for_analysis(&analysis) {
                    self.banner.replace(banner);
                }
            }
            Ok(response) => {
                tracing::warn!(
                    error = response.error.as_deref().unwrap_or("unknown"),
                    "Analysis failed"
                );
            }
            Err(e) => tracing::error!("Classification task aborted: {e}"),
        }
    }
}

async fn join_flight(flight: &mut Option<Flight>) -> Result<TriggerResponse, JoinError> {
    match flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
