//! Messages exchanged between the page context, the orchestrator, and the popup.

use serde::{Deserialize, Serialize};

use crate::{Analysis, Email};

/// Runtime message, serialized as `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RuntimeMessage {
    /// Page context asks the orchestrator to classify an email.
    #[serde(rename = "NEW_EMAIL")]
    NewEmail(Email),
    /// Informational: a new email was seen and analysis is starting.
    #[serde(rename = "NEW_EMAIL_DETECTED")]
    NewEmailDetected { subject: String, preview: String },
    /// Broadcast after a completed, persisted cycle.
    #[serde(rename = "EMAIL_ANALYSIS_COMPLETE")]
    EmailAnalysisComplete(Analysis),
}

impl RuntimeMessage {
    #[must_use]
    pub fn detected(email: &Email) -> Self {
        Self::NewEmailDetected {
            subject: email.subject.clone(),
            preview: email.preview(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewEmail(_) => "NEW_EMAIL",
            Self::NewEmailDetected { .. } => "NEW_EMAIL_DETECTED",
            Self::EmailAnalysisComplete(_) => "EMAIL_ANALYSIS_COMPLETE",
        }
    }
}

/// Reply to a `NEW_EMAIL` trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analysis: Option<Analysis>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl TriggerResponse {
    #[must_use]
    pub fn ok(analysis: Analysis) -> Self {
        Self {
            success: true,
            analysis: Some(analysis),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RuntimeMessage, TriggerResponse};
    use crate::{Analysis, Email};
    use serde_json::json;

    #[test]
    fn new_email_wire_shape() {
        let msg = RuntimeMessage::NewEmail(Email::new("Invoice", "Hi Bob"));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "NEW_EMAIL", "payload": {"subject": "Invoice", "body": "Hi Bob"}})
        );
    }

    #[test]
    fn detected_carries_truncated_preview() {
        let email = Email::new("Wire", "w".repeat(300));
        let RuntimeMessage::NewEmailDetected { subject, preview } = RuntimeMessage::detected(&email)
        else {
            panic!("expected NewEmailDetected");
        };
        assert_eq!(subject, "Wire");
        assert_eq!(preview, format!("{}...", "w".repeat(200)));
    }

    #[test]
    fn analysis_complete_parses_from_wire() {
        let raw = json!({"type": "EMAIL_ANALYSIS_COMPLETE", "payload": {"score": 8, "reason": "r"}});
        let msg: RuntimeMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(
            msg,
            RuntimeMessage::EmailAnalysisComplete(Analysis {
                score: 8,
                reason: "r".into()
            })
        );
        assert_eq!(msg.kind(), "EMAIL_ANALYSIS_COMPLETE");
    }

    #[test]
    fn failure_response_omits_analysis() {
        let resp = TriggerResponse::failure("API Key not set.");
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"success": false, "error": "API Key not set."})
        );
    }
}
