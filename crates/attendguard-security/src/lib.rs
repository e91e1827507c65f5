// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// attendguard-security: Attendance integrity and tamper detection.
//
// Seals attendance records with a canonical digest, the sealing device's
// identifier and an AEAD-encrypted audit payload, re-verifies them on read,
// and aggregates verification outcomes into security reports.  Everything
// here is synchronous and blocking; callers dispatch it off UI threads.

pub mod audit;
pub mod cipher;
pub mod device;
pub mod integrity;
pub mod keystore;
pub mod sealer;
pub mod service;
pub mod storage;
pub mod verifier;

use std::sync::Arc;

use attendguard_bridge::{DeviceInfoSource, SecretStorage};
use attendguard_core::SecurityConfig;

// PUBLIC API: Re-export the integrity primitives
pub use audit::SecurityAuditService;
pub use cipher::PayloadCipher;
pub use device::DeviceIdentityProvider;
pub use integrity::{canonical_digest, hash_bytes};
pub use keystore::{KeyDurability, KeyHandle, SecretKeyStore, SymmetricKey};
pub use sealer::RecordSealer;
pub use service::SecureAttendanceService;
pub use storage::SqliteSecretStorage;
pub use verifier::RecordVerifier;

/// The integrity components for one installation, wired together.
///
/// All components share one key store and one device identity provider;
/// the key store's creation lock is the only shared mutable state.
pub struct IntegrityStack {
    pub keys: Arc<SecretKeyStore>,
    pub device: Arc<DeviceIdentityProvider>,
    pub sealer: Arc<RecordSealer>,
    pub verifier: Arc<RecordVerifier>,
    pub auditor: SecurityAuditService,
}

impl IntegrityStack {
    pub fn new(
        storage: Arc<dyn SecretStorage>,
        device_info: Arc<dyn DeviceInfoSource>,
        config: &SecurityConfig,
    ) -> Self {
        let keys = Arc::new(SecretKeyStore::new(storage.clone(), config));
        let device = Arc::new(DeviceIdentityProvider::new(device_info, storage, config));
        let sealer = Arc::new(RecordSealer::new(
            device.clone(),
            PayloadCipher::new(keys.clone()),
        ));
        let verifier = Arc::new(RecordVerifier::new(device.clone()));
        let auditor = SecurityAuditService::new(verifier.clone());
        Self {
            keys,
            device,
            sealer,
            verifier,
            auditor,
        }
    }
}
