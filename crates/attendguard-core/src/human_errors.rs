// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language explanations of verification outcomes and errors.
//
// Findings are informational only: a flagged record stays visible and never
// blocks the attendance workflow.  The severity drives how the UI layer
// highlights it.

use crate::error::{AttendGuardError, TransitionReason};
use crate::types::VerificationOutcome;

/// Severity of a message from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing to do.
    Info,
    /// Security is reduced but the workflow continues.
    Degraded,
    /// The operation failed; the user may retry.
    Failure,
    /// The record is suspicious and should be reviewed by an administrator.
    Alert,
}

/// A human-readable message with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanMessage {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user or administrator should do (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same operation can help.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Explain a verification outcome for display next to the record.
pub fn humanize_outcome(outcome: VerificationOutcome) -> HumanMessage {
    match outcome {
        VerificationOutcome::Valid => HumanMessage {
            message: "This attendance record is verified.".into(),
            suggestion: "No action needed.".into(),
            retriable: false,
            severity: Severity::Info,
        },
        VerificationOutcome::Unsealed => HumanMessage {
            message: "This record was created before verification was available.".into(),
            suggestion: "It will be protected the next time it is updated.".into(),
            retriable: false,
            severity: Severity::Info,
        },
        VerificationOutcome::TamperedHash => HumanMessage {
            message: "This record was changed after it was saved.".into(),
            suggestion: "Ask an administrator to review the record before relying on it.".into(),
            retriable: false,
            severity: Severity::Alert,
        },
        VerificationOutcome::ForeignDevice => HumanMessage {
            message: "This record was created on a different device.".into(),
            suggestion: "If you recently changed phones this is expected; otherwise ask an administrator to review it.".into(),
            retriable: false,
            severity: Severity::Alert,
        },
    }
}

/// Convert an `AttendGuardError` into a message the user can act on.
pub fn humanize_error(err: &AttendGuardError) -> HumanMessage {
    match err {
        AttendGuardError::KeyUnavailable(_) => HumanMessage {
            message: "Secure storage on this device is not available.".into(),
            suggestion: "Your attendance is still recorded, but with reduced protection. Restart the app; if this keeps happening, contact support.".into(),
            retriable: true,
            severity: Severity::Degraded,
        },

        AttendGuardError::Encryption(_) => HumanMessage {
            message: "We couldn't protect this attendance record.".into(),
            suggestion: "Nothing was saved. Please try again.".into(),
            retriable: true,
            severity: Severity::Failure,
        },

        AttendGuardError::Decryption(_) | AttendGuardError::InvalidPayload(_) => HumanMessage {
            message: "The protected details of this record can't be read on this device.".into(),
            suggestion: "The record may come from another device or may have been altered. Ask an administrator to review it.".into(),
            retriable: false,
            severity: Severity::Alert,
        },

        AttendGuardError::IntegrityViolation { outcome, .. } => {
            let mut human = humanize_outcome(*outcome);
            human.suggestion = format!(
                "This record can't be updated until it is reviewed. {}",
                human.suggestion
            );
            human
        }

        AttendGuardError::RecordNotFound(_) => HumanMessage {
            message: "We couldn't find that attendance record.".into(),
            suggestion: "Refresh the list and try again.".into(),
            retriable: true,
            severity: Severity::Failure,
        },

        AttendGuardError::InvalidTransition(reason) => HumanMessage {
            message: "That action isn't possible right now.".into(),
            suggestion: match reason {
                TransitionReason::NotCheckedIn => "Check in first, then try again.".into(),
                TransitionReason::AlreadyCheckedOut => {
                    "You have already checked out for this record.".into()
                }
                TransitionReason::BreakInProgress => {
                    "End your current break before starting another.".into()
                }
                TransitionReason::NoBreakInProgress => "Start a break first.".into(),
            },
            retriable: false,
            severity: Severity::Failure,
        },

        AttendGuardError::PermissionDenied(_) => HumanMessage {
            message: "The app doesn't have permission to identify this device.".into(),
            suggestion: "Attendance still works; a private installation id is used instead.".into(),
            retriable: false,
            severity: Severity::Degraded,
        },

        AttendGuardError::Database(_) | AttendGuardError::Io(_) => HumanMessage {
            message: "We couldn't save to this device's storage.".into(),
            suggestion: "Make sure the device has free space, then try again.".into(),
            retriable: true,
            severity: Severity::Failure,
        },

        AttendGuardError::Serialization(_) => HumanMessage {
            message: "Some attendance data is in an unexpected format.".into(),
            suggestion: "Update the app to the latest version.".into(),
            retriable: false,
            severity: Severity::Failure,
        },

        AttendGuardError::Bridge(_) | AttendGuardError::PlatformUnavailable => HumanMessage {
            message: "This feature isn't available on this device.".into(),
            suggestion: "Attendance still works; some protections are reduced.".into(),
            retriable: false,
            severity: Severity::Degraded,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    #[test]
    fn findings_are_alerts() {
        assert_eq!(
            humanize_outcome(VerificationOutcome::TamperedHash).severity,
            Severity::Alert
        );
        assert_eq!(
            humanize_outcome(VerificationOutcome::ForeignDevice).severity,
            Severity::Alert
        );
    }

    #[test]
    fn unsealed_is_informational() {
        assert_eq!(
            humanize_outcome(VerificationOutcome::Unsealed).severity,
            Severity::Info
        );
    }

    #[test]
    fn key_unavailable_is_degraded_and_retriable() {
        let human = humanize_error(&AttendGuardError::KeyUnavailable("keystore locked".into()));
        assert_eq!(human.severity, Severity::Degraded);
        assert!(human.retriable);
    }

    #[test]
    fn integrity_violation_carries_outcome_severity() {
        let err = AttendGuardError::IntegrityViolation {
            record_id: RecordId::new(),
            outcome: VerificationOutcome::ForeignDevice,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Alert);
        assert!(human.suggestion.starts_with("This record can't be updated"));
    }

    #[test]
    fn checkout_without_checkin_suggests_check_in() {
        let err = AttendGuardError::InvalidTransition(TransitionReason::NotCheckedIn);
        let human = humanize_error(&err);
        assert_eq!(human.suggestion, "Check in first, then try again.");
    }

    #[test]
    fn each_transition_reason_has_its_own_suggestion() {
        let reasons = [
            TransitionReason::NotCheckedIn,
            TransitionReason::AlreadyCheckedOut,
            TransitionReason::BreakInProgress,
            TransitionReason::NoBreakInProgress,
        ];
        let suggestions: Vec<String> = reasons
            .iter()
            .map(|r| humanize_error(&AttendGuardError::InvalidTransition(*r)).suggestion)
            .collect();
        for (i, a) in suggestions.iter().enumerate() {
            for b in &suggestions[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            AttendGuardError::InvalidTransition(TransitionReason::BreakInProgress).to_string(),
            "invalid attendance transition: a break is already in progress"
        );
    }
}
