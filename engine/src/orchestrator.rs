//! The classification pipeline.
//!
//! One cycle walks an explicit phase sequence:
//!
//! ```text
//! Idle → KeyLookup → Extracting → Redacting → LocalScoring → RemoteScoring
//!      → Merging → Persisting → Notifying → Idle
//! ```
//!
//! A failure in any phase before `Persisting` completes leaves the stored
//! state untouched. Every error becomes a failed [`TriggerResponse`] at the
//! boundary; nothing escapes as a panic or an `Err` to the page context.
//!
//! Key lookup and the state write touch the filesystem and run on the blocking
//! pool. Desktop notifications are spawned after the response is decided and
//! never hold it up; hosts that exit right after a cycle call
//! [`Orchestrator::flush_notifications`] first.

use std::sync::{Arc, Mutex, PoisonError};

use becwatch_providers::{Classifier, ClassifierError};
use becwatch_types::{Analysis, Email, PersistedState, RuntimeMessage, TriggerResponse};
use becwatch_utils::redact_pii;
use chrono::Utc;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

use crate::bus::MessageBus;
use crate::heuristics::score_heuristics;
use crate::notifications::{DesktopNotification, Notifier};
use crate::storage::{ApiKeySource, StateStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    KeyLookup,
    /// Validating the email payload handed over by the page context.
    Extracting,
    Redacting,
    LocalScoring,
    RemoteScoring,
    Merging,
    Persisting,
    Notifying,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::KeyLookup => "key_lookup",
            Self::Extracting => "extracting",
            Self::Redacting => "redacting",
            Self::LocalScoring => "local_scoring",
            Self::RemoteScoring => "remote_scoring",
            Self::Merging => "merging",
            Self::Persisting => "persisting",
            Self::Notifying => "notifying",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("API Key not found. Run `becwatch set-key <KEY>` to configure one.")]
    MissingApiKey,
    #[error("email has no body to classify")]
    EmptyEmail,
    #[error(transparent)]
    Classification(#[from] ClassifierError),
    #[error("failed to save analysis: {0}")]
    Storage(#[from] StorageError),
    #[error("{} task did not finish: {source}", .phase.as_str())]
    Background {
        phase: Phase,
        #[source]
        source: JoinError,
    },
}

impl PipelineError {
    /// Phase in which the cycle stopped.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::MissingApiKey => Phase::KeyLookup,
            Self::EmptyEmail => Phase::Extracting,
            Self::Classification(_) => Phase::RemoteScoring,
            Self::Storage(_) => Phase::Persisting,
            Self::Background { phase, .. } => *phase,
        }
    }
}

/// Tracks the phase of one in-progress cycle and traces every transition.
#[derive(Debug)]
struct Cycle {
    phase: Phase,
}

impl Cycle {
    fn start() -> Self {
        Self { phase: Phase::Idle }
    }

    fn enter(&mut self, next: Phase) {
        tracing::debug!(
            from = self.phase.as_str(),
            to = next.as_str(),
            "Pipeline transition"
        );
        self.phase = next;
    }
}

/// Central coordinator: owns the classifier, both storage namespaces, the
/// message bus, and the notifier.
#[derive(Debug)]
pub struct Orchestrator<C, S, K, N> {
    classifier: C,
    store: Arc<S>,
    keys: Arc<K>,
    notifier: Arc<N>,
    bus: MessageBus,
    notifications: Mutex<JoinSet<()>>,
}

impl<C, S, K, N> Orchestrator<C, S, K, N>
where
    C: Classifier,
    S: StateStore + 'static,
    K: ApiKeySource + 'static,
    N: Notifier + 'static,
{
    pub fn new(classifier: C, store: Arc<S>, keys: K, notifier: N, bus: MessageBus) -> Self {
        Self {
            classifier,
            store,
            keys: Arc::new(keys),
            notifier: Arc::new(notifier),
            bus,
            notifications: Mutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one classification cycle for `email`.
    pub async fn handle_new_email(&self, email: Email) -> TriggerResponse {
        match self.run_cycle(email).await {
            Ok(analysis) => TriggerResponse::ok(analysis),
            Err(e) => {
                tracing::error!(phase = e.phase().as_str(), "Classification cycle failed: {e}");
                TriggerResponse::failure(e.to_string())
            }
        }
    }

    /// Wait for every desktop notification spawned so far.
    pub async fn flush_notifications(&self) {
        let mut pending = std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Notification task failed: {e}");
            }
        }
    }

    fn spawn_notification(&self, notification: DesktopNotification) {
        let notifier = Arc::clone(&self.notifier);
        let mut tasks = self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                tracing::warn!("Desktop notification failed: {e}");
            }
        });
    }

    async fn run_cycle(&self, email: Email) -> Result<Analysis, PipelineError> {
        let mut cycle = Cycle::start();

        cycle.enter(Phase::KeyLookup);
        let keys = Arc::clone(&self.keys);
        let api_key = blocking(Phase::KeyLookup, move || keys.api_key())
            .await?
            .ok_or(PipelineError::MissingApiKey)?;

        cycle.enter(Phase::Extracting);
        if !email.has_body() {
            return Err(PipelineError::EmptyEmail);
        }

        cycle.enter(Phase::Redacting);
        let subject = redact_pii(&email.subject);
        let body = redact_pii(&email.body);

        // Keyword scan sees the original text; only the remote call is redacted.
        cycle.enter(Phase::LocalScoring);
        let heuristics = score_heuristics(&email);

        cycle.enter(Phase::RemoteScoring);
        let verdict = self.classifier.classify(&api_key, &subject, &body).await?;

        cycle.enter(Phase::Merging);
        let analysis = Analysis::combine(verdict, &heuristics);

        cycle.enter(Phase::Persisting);
        let state = PersistedState::new(email, &analysis, Utc::now());
        let store = Arc::clone(&self.store);
        blocking(Phase::Persisting, move || store.save(&state)).await??;
        self.bus
            .publish(RuntimeMessage::EmailAnalysisComplete(analysis.clone()));

        cycle.enter(Phase::Notifying);
        if let Some(notification) = DesktopNotification::high_risk(&analysis) {
            self.spawn_notification(notification);
        }

        cycle.enter(Phase::Idle);
        tracing::info!(
            score = analysis.score,
            tier = analysis.tier().as_str(),
            local_flags = heuristics.reasons().len(),
            "Email classified"
        );
        Ok(analysis)
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(phase: Phase, work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|source| PipelineError::Background { phase, source })
}
