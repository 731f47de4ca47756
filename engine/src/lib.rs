//! Core engine for becwatch: detection, orchestration, and presentation state.
//!
//! This crate holds everything between the page and the screen without any
//! terminal dependencies. Hosts feed it page events and snapshots, and render
//! the view models it produces.

pub mod bus;
pub mod context;
pub mod detector;
pub mod extractor;
pub mod heuristics;
pub mod notifications;
pub mod orchestrator;
pub mod presentation;
pub mod relay;
pub mod storage;

pub use becwatch_config::{BecwatchConfig, ConfigError, DetectorConfig};
pub use becwatch_providers::{self, Classifier, ClassifierError, GeminiClassifier, GeminiConfig};
pub use becwatch_types::{
    Analysis, ApiKey, Email, OverlapPolicy, PersistedState, RiskTier, RuntimeMessage,
    TriggerResponse, Verdict,
};

pub use bus::MessageBus;
pub use context::{PageContext, PageEvent, Timing, TriggerTarget};
pub use detector::{ChangeDetector, CheckDecision, FlightGuard, SkipReason};
pub use extractor::{
    EmailSource, HtmlSnapshotSource, PageSelectors, SelectorError, container_fingerprint,
    extract_email,
};
pub use heuristics::score_heuristics;
pub use notifications::{
    AlertChannel, CommandNotifier, DesktopNotification, LogNotifier, Notifier, NotifyError,
};
pub use orchestrator::{Orchestrator, Phase, PipelineError};
pub use presentation::{
    BANNER_ID, Banner, BannerPlacement, BannerSink, LatestBanner, PopupView, ScoreLine,
};
pub use relay::{MessageLog, MessageTail, PopupFeed, PopupUpdate, RelayError};
pub use storage::{ApiKeySource, ConfigKeySource, FileStateStore, StateStore, StorageError};
