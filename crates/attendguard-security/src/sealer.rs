// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record sealer: attaches the security envelope to an attendance record.
//
// A record must be resealed after every legitimate edit of a digest-covered
// field; an envelope always reflects the last legitimate write.

use std::sync::Arc;

use attendguard_core::error::{AttendGuardError, Result};
use attendguard_core::types::{AttendanceRecord, AuditPayload, SecurityEnvelope};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::cipher::PayloadCipher;
use crate::device::DeviceIdentityProvider;
use crate::integrity::canonical_digest;
use crate::keystore::KeyDurability;

/// Produces security envelopes and opens their audit payloads.
pub struct RecordSealer {
    device: Arc<DeviceIdentityProvider>,
    cipher: PayloadCipher,
}

impl RecordSealer {
    pub fn new(device: Arc<DeviceIdentityProvider>, cipher: PayloadCipher) -> Self {
        Self { device, cipher }
    }

    /// Compute the envelope for `record`'s current field values.
    ///
    /// Any existing envelope on `record` is ignored.  Fails only on key or
    /// cipher faults; the tamper flag of the result is always cleared.
    #[instrument(skip_all, fields(record_id = %record.id))]
    pub fn seal(&self, record: &AttendanceRecord) -> Result<SecurityEnvelope> {
        let security_hash = canonical_digest(record);
        let device = self.device.identify();

        let payload = AuditPayload {
            record_id: record.id,
            check_in: record.check_in,
            check_out: record.check_out,
            break_start: record.break_start,
            break_end: record.break_end,
            total_break_secs: record.total_break_secs,
            worked_secs: record.worked_secs,
            sealed_at: Utc::now(),
        };
        let json = serde_json::to_vec(&payload)?;
        let encrypted_audit_payload = self.cipher.encrypt_to_base64(&json)?;

        debug!(%device, "record sealed");
        Ok(SecurityEnvelope {
            security_hash,
            device_fingerprint: device.as_str().to_owned(),
            encrypted_audit_payload,
            tamper_detected: false,
        })
    }

    /// [`RecordSealer::seal`], returning the record with its new envelope.
    pub fn seal_record(&self, record: AttendanceRecord) -> Result<AttendanceRecord> {
        let envelope = self.seal(&record)?;
        Ok(record.with_envelope(envelope))
    }

    /// Decrypt the audit payload stored in `record`'s envelope.
    #[instrument(skip_all, fields(record_id = %record.id))]
    pub fn open_payload(&self, record: &AttendanceRecord) -> Result<AuditPayload> {
        let encoded = &record.security.encrypted_audit_payload;
        if encoded.is_empty() {
            return Err(AttendGuardError::InvalidPayload(
                "record carries no audit payload".into(),
            ));
        }

        let json = self.cipher.decrypt_base64(encoded)?;
        serde_json::from_slice(&json)
            .map_err(|e| AttendGuardError::InvalidPayload(format!("payload JSON: {e}")))
    }

    /// Whether envelopes from this sealer outlive the process.
    pub fn key_durability(&self) -> Result<KeyDurability> {
        self.cipher.key_durability()
    }
}
