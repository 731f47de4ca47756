//! Wiring config into live pipeline components.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use becwatch_config::{BecwatchConfig, ClassifierConfig};
use becwatch_engine::becwatch_providers::retry::RetryConfig;
use becwatch_engine::{
    AlertChannel, ConfigKeySource, FileStateStore, GeminiClassifier, GeminiConfig, MessageBus,
    MessageLog, MessageTail, Orchestrator, PageSelectors,
};
use tokio::task::JoinHandle;

pub type LiveOrchestrator =
    Orchestrator<GeminiClassifier, FileStateStore, ConfigKeySource, AlertChannel>;

/// Classifier settings with config overrides applied.
#[must_use]
pub fn gemini_config(settings: Option<&ClassifierConfig>) -> GeminiConfig {
    let mut config = GeminiConfig::default();
    let Some(settings) = settings else {
        return config;
    };

    if let Some(model) = settings.model.as_deref().filter(|m| !m.trim().is_empty()) {
        config.model = model.trim().to_string();
    }
    if let Some(base_url) = settings.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.base_url = base_url.trim().to_string();
    }
    let defaults = RetryConfig::default();
    config.retry = RetryConfig {
        max_attempts: settings.max_attempts.unwrap_or(defaults.max_attempts),
        base_delay: settings
            .base_delay_ms
            .map_or(defaults.base_delay, Duration::from_millis),
        max_jitter: settings
            .max_jitter_ms
            .map_or(defaults.max_jitter, Duration::from_millis),
    };
    if let Some(secs) = settings.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    config
}

pub fn state_store(config: &BecwatchConfig) -> Result<FileStateStore> {
    let path = config
        .state_path()
        .context("cannot locate a home directory for ~/.becwatch/state.json")?;
    Ok(FileStateStore::new(path))
}

/// Tail of the message log, when a home directory is known.
pub fn message_tail(config: &BecwatchConfig) -> Option<MessageTail> {
    config.message_log_path().map(MessageTail::from_end)
}

/// Relay bus broadcasts to the message log for popups in other processes.
///
/// Returns `None` when the log cannot be opened; the cycle still runs, only
/// other terminals miss the live updates. The task ends once every publisher
/// on `bus` is dropped.
pub async fn start_relay(config: &BecwatchConfig, bus: &MessageBus) -> Option<JoinHandle<()>> {
    let path = config.message_log_path()?;
    match MessageLog::open(path).await {
        Ok(log) => Some(tokio::spawn(log.relay(bus.subscribe()))),
        Err(e) => {
            tracing::warn!("Live popup updates disabled: {e}");
            None
        }
    }
}

/// Wait for the relay to write out what was published.
pub async fn finish_relay(relay: Option<JoinHandle<()>>) {
    if let Some(relay) = relay
        && let Err(e) = relay.await
    {
        tracing::warn!("Message relay task failed: {e}");
    }
}

pub fn page_selectors(config: &BecwatchConfig) -> Result<PageSelectors> {
    PageSelectors::from_config(config.detector()).context("invalid selector in [detector] config")
}

pub fn orchestrator(config: &BecwatchConfig, bus: MessageBus) -> Result<Arc<LiveOrchestrator>> {
    let classifier = GeminiClassifier::new(gemini_config(config.classifier.as_ref()));
    let store = Arc::new(state_store(config)?);
    let notifier = AlertChannel::from_config(config.desktop_alerts());
    Ok(Arc::new(Orchestrator::new(
        classifier,
        store,
        ConfigKeySource::new(),
        notifier,
        bus,
    )))
}
