//! New-email recognition and single-flight gating.
//!
//! The detector decides, after a debounce window, whether the email on screen
//! deserves a classification cycle: it must exist, differ from the last one
//! dispatched, and no cycle may already be running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use becwatch_types::{Email, OverlapPolicy, Signature};

/// Why a check did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Extraction found no body.
    NoEmail,
    /// Same signature as the last dispatched email.
    Unchanged,
    /// A cycle is already running.
    InFlight,
}

#[derive(Debug)]
pub enum CheckDecision {
    Skip(SkipReason),
    /// Start a cycle. The guard must live until the cycle ends.
    Dispatch { email: Email, guard: FlightGuard },
}

/// Holds the in-flight flag for the lifetime of one cycle.
///
/// Dropping the guard clears the flag on every exit path, panics included.
#[derive(Debug)]
pub struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct ChangeDetector {
    last_signature: Option<Signature>,
    in_flight: Arc<AtomicBool>,
    pending: bool,
    policy: OverlapPolicy,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            last_signature: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: false,
            policy,
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn last_signature(&self) -> Option<&Signature> {
        self.last_signature.as_ref()
    }

    /// Decide on a freshly extracted email.
    ///
    /// The signature is only recorded on dispatch, so an email dropped while
    /// another cycle runs is picked up by the next check.
    pub fn evaluate(&mut self, extracted: Option<Email>) -> CheckDecision {
        let Some(email) = extracted.filter(Email::has_body) else {
            return CheckDecision::Skip(SkipReason::NoEmail);
        };

        let signature = email.signature();
        if self.last_signature.as_ref() == Some(&signature) {
            return CheckDecision::Skip(SkipReason::Unchanged);
        }

        if self.is_in_flight() {
            if self.policy == OverlapPolicy::ReplacePending {
                self.pending = true;
            }
            tracing::debug!(policy = ?self.policy, "Dropping check while a cycle is in flight");
            return CheckDecision::Skip(SkipReason::InFlight);
        }

        self.last_signature = Some(signature);
        self.in_flight.store(true, Ordering::Release);
        CheckDecision::Dispatch {
            email,
            guard: FlightGuard {
                flag: Arc::clone(&self.in_flight),
            },
        }
    }

    /// Whether a check was deferred during the flight that just ended.
    ///
    /// Clears the flag: at most one re-run per flight.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}
