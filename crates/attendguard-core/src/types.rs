// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for attendance records and their security envelope.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A captured position for a check-in or check-out event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Reverse-geocoded address or a named site ("Office").
    pub address: String,
    /// Horizontal accuracy in metres.
    pub accuracy: f32,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, address: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            address: address.into(),
            accuracy: 0.0,
        }
    }
}

/// Attendance status for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
    Late,
    HalfDay,
    OnLeave,
    Remote,
    PendingApproval,
}

impl AttendanceStatus {
    /// Stable wire name.  Used by the canonical digest, so existing names
    /// must never change.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::HalfDay => "half_day",
            Self::OnLeave => "on_leave",
            Self::Remote => "remote",
            Self::PendingApproval => "pending_approval",
        }
    }
}

/// Fields written by the sealer and owned exclusively by the integrity layer.
///
/// Persisted flattened into the attendance record as `security_hash`,
/// `device_fingerprint`, `encrypted_audit_payload` and `tamper_detected`.
/// A record was never sealed only when every envelope field is empty; a
/// partly blanked envelope still counts as sealed and fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityEnvelope {
    /// SHA-256 canonical digest, 64 lowercase hex characters.
    pub security_hash: String,
    /// Device identifier of the sealing installation, 64 lowercase hex characters.
    pub device_fingerprint: String,
    /// Base64 of `nonce || ciphertext || tag`.
    pub encrypted_audit_payload: String,
    pub tamper_detected: bool,
}

impl SecurityEnvelope {
    pub fn is_sealed(&self) -> bool {
        !self.security_hash.is_empty()
            || !self.device_fingerprint.is_empty()
            || !self.encrypted_audit_payload.is_empty()
            || self.tamper_detected
    }
}

/// A single attendance record as held by the external record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub user_id: String,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub check_in_location: Option<Location>,
    pub check_out_location: Option<Location>,
    pub break_start: Option<DateTime<Utc>>,
    pub break_end: Option<DateTime<Utc>>,
    /// Accumulated break time across all breaks, in seconds.
    #[serde(default)]
    pub total_break_secs: u64,
    /// Worked time (check-out minus check-in minus breaks), in seconds.
    #[serde(default)]
    pub worked_secs: u64,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub manual_entry: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub security: SecurityEnvelope,
}

impl AttendanceRecord {
    /// An empty, unsealed record for `user_id` on `date`.
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            date,
            check_in: None,
            check_out: None,
            check_in_location: None,
            check_out_location: None,
            break_start: None,
            break_end: None,
            total_break_secs: 0,
            worked_secs: 0,
            status: AttendanceStatus::default(),
            notes: String::new(),
            manual_entry: false,
            approved_by: None,
            created_at: now,
            updated_at: now,
            security: SecurityEnvelope::default(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.security.is_sealed()
    }

    /// Replace the security envelope, returning the updated record.
    pub fn with_envelope(mut self, envelope: SecurityEnvelope) -> Self {
        self.security = envelope;
        self
    }
}

/// Stable identifier of the installation that sealed a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an already-computed hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of re-verifying a record against its security envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Digest and device identifier both match.
    Valid,
    /// A digest-covered field changed since the record was last sealed.
    TamperedHash,
    /// The record was sealed by a different installation.
    ForeignDevice,
    /// Legacy record with no envelope; not yet verifiable.
    Unsealed,
}

impl VerificationOutcome {
    /// Whether this outcome should flag the record as suspicious.
    pub fn is_finding(&self) -> bool {
        matches!(self, Self::TamperedHash | Self::ForeignDevice)
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Valid => "valid",
            Self::TamperedHash => "tampered hash",
            Self::ForeignDevice => "foreign device",
            Self::Unsealed => "unsealed",
        };
        f.write_str(s)
    }
}

/// The temporal facts kept encrypted inside the envelope for dispute
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPayload {
    pub record_id: RecordId,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub break_start: Option<DateTime<Utc>>,
    pub break_end: Option<DateTime<Utc>>,
    pub total_break_secs: u64,
    pub worked_secs: u64,
    pub sealed_at: DateTime<Utc>,
}

/// Aggregate verification summary over a set of records.  Computed on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub unsealed_records: usize,
    pub tampered_records: usize,
    pub foreign_device_records: usize,
    /// Ids of records with a `TamperedHash` or `ForeignDevice` outcome.
    pub flagged_record_ids: Vec<RecordId>,
    pub device_fingerprint: DeviceId,
    pub generated_at: DateTime<Utc>,
}

impl SecurityReport {
    /// No tamper or foreign-device findings.
    pub fn is_clean(&self) -> bool {
        self.tampered_records == 0 && self.foreign_device_records == 0
    }
}
