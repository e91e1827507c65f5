// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record verifier: recomputes digest and device identifier and compares
// them against the sealed envelope.
//
// Findings are values, never errors.  Verification is read-only; callers
// decide whether to persist the tamper flag.

use std::sync::Arc;

use attendguard_core::types::{AttendanceRecord, DeviceId, VerificationOutcome};
use tracing::{debug, warn};

use crate::device::DeviceIdentityProvider;
use crate::integrity::canonical_digest;

/// Checks sealed records against the current installation.
pub struct RecordVerifier {
    device: Arc<DeviceIdentityProvider>,
}

impl RecordVerifier {
    pub fn new(device: Arc<DeviceIdentityProvider>) -> Self {
        Self { device }
    }

    /// Identifier of the installation doing the verifying.
    pub fn current_device(&self) -> DeviceId {
        self.device.identify()
    }

    /// Verify `record` against its envelope.
    ///
    /// A digest mismatch takes precedence over a device mismatch.  Records
    /// sealed with a digest but no device fingerprint are checked on the
    /// digest alone.  Only a fully empty envelope is `Unsealed`; a missing
    /// digest next to other envelope fields is `TamperedHash`.
    pub fn verify(&self, record: &AttendanceRecord) -> VerificationOutcome {
        let envelope = &record.security;
        if !envelope.is_sealed() {
            debug!(record_id = %record.id, "record unsealed");
            return VerificationOutcome::Unsealed;
        }

        // `canonical_digest` never reads the envelope, so it is implicitly
        // blanked here.
        if canonical_digest(record) != envelope.security_hash {
            warn!(record_id = %record.id, "digest mismatch; record modified since sealing");
            return VerificationOutcome::TamperedHash;
        }

        if !envelope.device_fingerprint.is_empty()
            && envelope.device_fingerprint != self.device.identify().as_str()
        {
            warn!(record_id = %record.id, "record sealed on another device");
            return VerificationOutcome::ForeignDevice;
        }

        VerificationOutcome::Valid
    }

    /// A copy of `record` with `tamper_detected` set if verification finds
    /// tampering or a foreign device.  An existing flag is kept.
    pub fn annotate(&self, record: &AttendanceRecord) -> AttendanceRecord {
        let outcome = self.verify(record);
        let mut annotated = record.clone();
        annotated.security.tamper_detected |= outcome.is_finding();
        annotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::PayloadCipher;
    use crate::keystore::SecretKeyStore;
    use crate::sealer::RecordSealer;
    use attendguard_bridge::SecretStorage;
    use attendguard_bridge::memory::{FixedDeviceInfo, MemorySecretStorage};
    use attendguard_core::SecurityConfig;
    use attendguard_core::types::AttendanceStatus;
    use chrono::NaiveDate;

    struct Device {
        sealer: RecordSealer,
        verifier: RecordVerifier,
    }

    fn device(serial: &str) -> Device {
        let config = SecurityConfig::default();
        let storage: Arc<dyn SecretStorage> = Arc::new(MemorySecretStorage::new());
        let identity = Arc::new(DeviceIdentityProvider::new(
            Arc::new(FixedDeviceInfo::new("Pixel 8", Some(serial))),
            storage.clone(),
            &config,
        ));
        let keys = Arc::new(SecretKeyStore::new(storage, &config));
        Device {
            sealer: RecordSealer::new(identity.clone(), PayloadCipher::new(keys)),
            verifier: RecordVerifier::new(identity),
        }
    }

    fn record() -> AttendanceRecord {
        let mut r = AttendanceRecord::new("u1", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        r.status = AttendanceStatus::Present;
        r
    }

    #[test]
    fn sealed_record_is_valid() {
        let d = device("SN-001");
        let sealed = d.sealer.seal_record(record()).unwrap();
        assert_eq!(d.verifier.verify(&sealed), VerificationOutcome::Valid);
    }

    #[test]
    fn never_sealed_record_is_unsealed_not_tampered() {
        let d = device("SN-001");
        assert_eq!(d.verifier.verify(&record()), VerificationOutcome::Unsealed);
        assert!(!d.verifier.annotate(&record()).security.tamper_detected);
    }

    #[test]
    fn edited_status_is_tampered() {
        let d = device("SN-001");
        let mut sealed = d.sealer.seal_record(record()).unwrap();
        sealed.status = AttendanceStatus::OnLeave;
        assert_eq!(d.verifier.verify(&sealed), VerificationOutcome::TamperedHash);
    }

    #[test]
    fn edited_digest_is_tampered() {
        let d = device("SN-001");
        let mut sealed = d.sealer.seal_record(record()).unwrap();
        sealed.security.security_hash = "0".repeat(64);
        assert_eq!(d.verifier.verify(&sealed), VerificationOutcome::TamperedHash);
    }

    #[test]
    fn blanked_digest_with_edit_is_tampered() {
        let d = device("SN-001");
        let mut sealed = d.sealer.seal_record(record()).unwrap();
        sealed.security.security_hash.clear();
        sealed.status = AttendanceStatus::Remote;
        assert_eq!(d.verifier.verify(&sealed), VerificationOutcome::TamperedHash);
        assert!(d.verifier.annotate(&sealed).security.tamper_detected);
    }

    #[test]
    fn other_device_is_foreign() {
        let sealed = device("SN-001").sealer.seal_record(record()).unwrap();
        assert_eq!(
            device("SN-002").verifier.verify(&sealed),
            VerificationOutcome::ForeignDevice
        );
    }

    #[test]
    fn tamper_outranks_foreign_device() {
        let mut sealed = device("SN-001").sealer.seal_record(record()).unwrap();
        sealed.notes = "edited".into();
        assert_eq!(
            device("SN-002").verifier.verify(&sealed),
            VerificationOutcome::TamperedHash
        );
    }

    #[test]
    fn digest_only_legacy_seal_checks_digest() {
        let d = device("SN-001");
        let mut sealed = d.sealer.seal_record(record()).unwrap();
        sealed.security.device_fingerprint.clear();
        assert_eq!(device("SN-002").verifier.verify(&sealed), VerificationOutcome::Valid);
    }

    #[test]
    fn verify_does_not_mutate_and_annotate_flags() {
        let d = device("SN-001");
        let mut sealed = d.sealer.seal_record(record()).unwrap();
        sealed.user_id = "u2".into();
        let before = sealed.clone();

        let _ = d.verifier.verify(&sealed);
        assert_eq!(sealed, before);

        let annotated = d.verifier.annotate(&sealed);
        assert!(annotated.security.tamper_detected);
        assert!(!sealed.security.tamper_detected);
    }
}
