// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure attendance workflow: check-in, breaks and check-out over an
// injected record store, sealing every write.
//
// Every edit first verifies the stored record.  A tampered or foreign record
// is flagged in the store and the edit is refused with `IntegrityViolation`;
// reads never refuse, they only annotate.

use std::sync::Arc;

use attendguard_bridge::AttendanceStore;
use attendguard_core::error::{AttendGuardError, Result, TransitionReason};
use attendguard_core::types::{
    AttendanceRecord, AttendanceStatus, Location, RecordId, SecurityReport,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::audit::SecurityAuditService;
use crate::sealer::RecordSealer;
use crate::verifier::RecordVerifier;

/// Attendance operations that keep every stored record sealed.
pub struct SecureAttendanceService {
    store: Arc<dyn AttendanceStore>,
    sealer: Arc<RecordSealer>,
    verifier: Arc<RecordVerifier>,
    auditor: SecurityAuditService,
}

impl SecureAttendanceService {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        sealer: Arc<RecordSealer>,
        verifier: Arc<RecordVerifier>,
    ) -> Self {
        let auditor = SecurityAuditService::new(verifier.clone());
        Self {
            store,
            sealer,
            verifier,
            auditor,
        }
    }

    // -- Writes ---------------------------------------------------------------

    /// Record a check-in now.
    pub fn check_in(
        &self,
        user_id: &str,
        location: Location,
        notes: &str,
    ) -> Result<AttendanceRecord> {
        self.check_in_at(user_id, location, notes, Utc::now())
    }

    /// Record a check-in at `at`, creating a sealed record for that day.
    #[instrument(skip(self, location, notes))]
    pub fn check_in_at(
        &self,
        user_id: &str,
        location: Location,
        notes: &str,
        at: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut record = AttendanceRecord::new(user_id, at.date_naive());
        record.check_in = Some(at);
        record.check_in_location = Some(location);
        record.status = AttendanceStatus::Present;
        record.notes = notes.to_owned();
        record.created_at = at;
        record.updated_at = at;

        let sealed = self.sealer.seal_record(record)?;
        self.store.upsert(&sealed)?;
        info!(record_id = %sealed.id, "check-in recorded");
        Ok(sealed)
    }

    pub fn start_break(&self, id: &RecordId) -> Result<AttendanceRecord> {
        self.start_break_at(id, Utc::now())
    }

    /// Open a break on a checked-in record.
    #[instrument(skip(self))]
    pub fn start_break_at(&self, id: &RecordId, at: DateTime<Utc>) -> Result<AttendanceRecord> {
        let mut record = self.load_verified(id)?;
        require_open_shift(&record)?;
        if on_break(&record) {
            return Err(AttendGuardError::InvalidTransition(
                TransitionReason::BreakInProgress,
            ));
        }

        record.break_start = Some(at);
        record.break_end = None;
        self.reseal(record, at)
    }

    pub fn end_break(&self, id: &RecordId) -> Result<AttendanceRecord> {
        self.end_break_at(id, Utc::now())
    }

    /// Close the open break and add its length to the break total.
    #[instrument(skip(self))]
    pub fn end_break_at(&self, id: &RecordId, at: DateTime<Utc>) -> Result<AttendanceRecord> {
        let mut record = self.load_verified(id)?;
        require_open_shift(&record)?;
        let Some(start) = record.break_start.filter(|_| on_break(&record)) else {
            return Err(AttendGuardError::InvalidTransition(
                TransitionReason::NoBreakInProgress,
            ));
        };

        record.break_end = Some(at);
        record.total_break_secs = record
            .total_break_secs
            .saturating_add(secs_between(start, at));
        self.reseal(record, at)
    }

    pub fn check_out(
        &self,
        id: &RecordId,
        location: Location,
        notes: &str,
    ) -> Result<AttendanceRecord> {
        self.check_out_at(id, location, notes, Utc::now())
    }

    /// Record a check-out at `at`, closing any open break and computing
    /// worked time.
    #[instrument(skip(self, location, notes))]
    pub fn check_out_at(
        &self,
        id: &RecordId,
        location: Location,
        notes: &str,
        at: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut record = self.load_verified(id)?;
        let check_in = require_open_shift(&record)?;

        if on_break(&record) {
            if let Some(start) = record.break_start {
                record.total_break_secs = record
            .total_break_secs
            .saturating_add(secs_between(start, at));
            }
            record.break_end = Some(at);
        }

        record.check_out = Some(at);
        record.check_out_location = Some(location);
        record.worked_secs = secs_between(check_in, at).saturating_sub(record.total_break_secs);
        if !notes.is_empty() {
            if record.notes.is_empty() {
                record.notes = notes.to_owned();
            } else {
                record.notes = format!("{}\n{notes}", record.notes);
            }
        }

        let sealed = self.reseal(record, at)?;
        info!(record_id = %sealed.id, worked_secs = sealed.worked_secs, "check-out recorded");
        Ok(sealed)
    }

    // -- Reads ----------------------------------------------------------------

    /// All records for `user_id`, with suspicious ones flagged.
    pub fn secure_records(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .store
            .records_for_user(user_id)?
            .iter()
            .map(|r| self.verifier.annotate(r))
            .collect())
    }

    /// Only the records for `user_id` that fail verification.
    pub fn suspicious_records(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .secure_records(user_id)?
            .into_iter()
            .filter(|r| self.verifier.verify(r).is_finding())
            .collect())
    }

    /// Audit every record in the store.
    pub fn security_report(&self) -> Result<SecurityReport> {
        let records = self.store.all_records()?;
        Ok(self.auditor.audit(&records))
    }

    // -- Internals ------------------------------------------------------------

    /// Fetch a record that may be extended.  Unsealed legacy records pass and
    /// are sealed by the edit.
    fn load_verified(&self, id: &RecordId) -> Result<AttendanceRecord> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| AttendGuardError::RecordNotFound(id.to_string()))?;

        let outcome = self.verifier.verify(&record);
        if outcome.is_finding() {
            warn!(record_id = %id, %outcome, "refusing to extend suspicious record");
            if !record.security.tamper_detected {
                self.store.upsert(&self.verifier.annotate(&record))?;
            }
            return Err(AttendGuardError::IntegrityViolation {
                record_id: *id,
                outcome,
            });
        }
        Ok(record)
    }

    fn reseal(&self, mut record: AttendanceRecord, at: DateTime<Utc>) -> Result<AttendanceRecord> {
        record.updated_at = at;
        let sealed = self.sealer.seal_record(record)?;
        self.store.upsert(&sealed)?;
        Ok(sealed)
    }
}

/// The check-in time of a record that is checked in but not out.
fn require_open_shift(record: &AttendanceRecord) -> Result<DateTime<Utc>> {
    let Some(check_in) = record.check_in else {
        return Err(AttendGuardError::InvalidTransition(TransitionReason::NotCheckedIn));
    };
    if record.check_out.is_some() {
        return Err(AttendGuardError::InvalidTransition(TransitionReason::AlreadyCheckedOut));
    }
    Ok(check_in)
}

fn on_break(record: &AttendanceRecord) -> bool {
    record.break_start.is_some() && record.break_end.is_none()
}

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}
