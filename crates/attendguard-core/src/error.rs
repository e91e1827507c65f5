// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for attendguard.
//
// Verification findings (tampered digest, foreign device, unsealed record)
// are not errors; they are `VerificationOutcome` values.  Only faults that
// abort a specific seal/open/store call live here.

use thiserror::Error;

use crate::types::{RecordId, VerificationOutcome};

/// Top-level error type for all attendguard operations.
#[derive(Debug, Error)]
pub enum AttendGuardError {
    // -- Key material --
    #[error("secret key unavailable: {0}")]
    KeyUnavailable(String),

    // -- Cipher --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid audit payload: {0}")]
    InvalidPayload(String),

    // -- Device identity --
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // -- Attendance workflow --
    #[error("attendance record not found: {0}")]
    RecordNotFound(String),

    #[error("invalid attendance transition: {0}")]
    InvalidTransition(TransitionReason),

    #[error("record {record_id} failed integrity verification ({outcome})")]
    IntegrityViolation {
        record_id: RecordId,
        outcome: VerificationOutcome,
    },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Why an attendance workflow step was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// The record has no check-in yet.
    NotCheckedIn,
    /// The record is already checked out.
    AlreadyCheckedOut,
    /// A break was started while another is still open.
    BreakInProgress,
    /// A break was ended with none open.
    NoBreakInProgress,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotCheckedIn => "operation requires a check-in",
            Self::AlreadyCheckedOut => "record is already checked out",
            Self::BreakInProgress => "a break is already in progress",
            Self::NoBreakInProgress => "no break in progress",
        })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AttendGuardError>;
