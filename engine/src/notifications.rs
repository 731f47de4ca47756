//! High-risk desktop alerts.
//!
//! Delivery is best-effort: a failed notification is logged by the caller and
//! never fails the classification cycle.

use std::future::Future;

use becwatch_types::{Analysis, RiskTier};
use thiserror::Error;
use uuid::Uuid;

/// Highest urgency the platform offers.
pub const HIGH_PRIORITY: u8 = 2;

/// A single alert raised for a high-risk email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub priority: u8,
}

impl DesktopNotification {
    /// Alert for `analysis`, or `None` below the high-risk threshold.
    #[must_use]
    pub fn high_risk(analysis: &Analysis) -> Option<Self> {
        if analysis.tier() != RiskTier::High {
            return None;
        }
        Some(Self {
            id: format!("high-risk-email-{}", Uuid::new_v4()),
            title: format!(
                "⚠️ High-Risk Email Detected! (Score: {}/10)",
                analysis.score
            ),
            message: format!("Reason: {}", analysis.reason),
            priority: HIGH_PRIORITY,
        })
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: String },
}

pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        notification: &DesktopNotification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts through `notify-send` (freedesktop notification daemon).
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl CommandNotifier {
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn urgency(priority: u8) -> &'static str {
        match priority {
            0 => "low",
            1 => "normal",
            _ => "critical",
        }
    }
}

impl Notifier for CommandNotifier {
    async fn notify(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        let output = tokio::process::Command::new(&self.program)
            .arg(format!("--urgency={}", Self::urgency(notification.priority)))
            .arg("--app-name=becwatch")
            .arg(&notification.title)
            .arg(&notification.message)
            .output()
            .await
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            tracing::debug!(id = %notification.id, "Desktop notification posted");
            Ok(())
        } else {
            Err(NotifyError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
            })
        }
    }
}

/// Writes alerts to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        tracing::warn!(
            id = %notification.id,
            title = %notification.title,
            message = %notification.message,
            "High-risk email"
        );
        Ok(())
    }
}

/// Runtime choice between the concrete notifiers.
#[derive(Debug, Clone)]
pub enum AlertChannel {
    Desktop(CommandNotifier),
    Log(LogNotifier),
}

impl AlertChannel {
    #[must_use]
    pub fn from_config(desktop: bool) -> Self {
        if desktop {
            Self::Desktop(CommandNotifier::default())
        } else {
            Self::Log(LogNotifier)
        }
    }
}

impl Notifier for AlertChannel {
    async fn notify(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        match self {
            Self::Desktop(n) => n.notify(notification).await,
            Self::Log(n) => n.notify(notification).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use becwatch_types::Analysis;

    use super::{CommandNotifier, DesktopNotification, LogNotifier, Notifier, NotifyError};

    fn analysis(score: u8) -> Analysis {
        Analysis {
            score,
            reason: "Payment redirection".into(),
        }
    }

    #[test]
    fn no_alert_below_seven() {
        assert!(DesktopNotification::high_risk(&analysis(6)).is_none());
        assert!(DesktopNotification::high_risk(&analysis(0)).is_none());
    }

    #[test]
    fn alert_text_and_priority() {
        let n = DesktopNotification::high_risk(&analysis(8)).unwrap();
        assert_eq!(n.title, "⚠️ High-Risk Email Detected! (Score: 8/10)");
        assert_eq!(n.message, "Reason: Payment redirection");
        assert_eq!(n.priority, 2);
        assert!(n.id.starts_with("high-risk-email-"));
    }

    #[test]
    fn alert_ids_are_unique() {
        let a = DesktopNotification::high_risk(&analysis(9)).unwrap();
        let b = DesktopNotification::high_risk(&analysis(9)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let n = DesktopNotification::high_risk(&analysis(10)).unwrap();
        LogNotifier.notify(&n).await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let n = DesktopNotification::high_risk(&analysis(10)).unwrap();
        let notifier = CommandNotifier::with_program("becwatch-no-such-notifier-binary");
        let err = notifier.notify(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::Spawn { .. }));
    }
}
