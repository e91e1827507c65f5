// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic contracts consumed by the integrity layer.
//
// None of these stores provide concurrency guarantees of their own; callers
// that need check-and-create semantics bring their own lock.

use attendguard_core::error::Result;
use attendguard_core::types::{AttendanceRecord, RecordId};

/// Unified bridge that groups the native capabilities of one platform.
pub trait PlatformBridge: SecretStorage + DeviceInfoSource {
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;

    /// Whether secrets are held in hardware-backed storage (Keystore,
    /// Secure Enclave).
    fn is_hardware_backed(&self) -> bool;
}

/// Single-key secret storage in the platform keychain / keystore.
pub trait SecretStorage: Send + Sync {
    /// Retrieve a secret by id.  Returns None if not found.
    fn load(&self, key_id: &str) -> Result<Option<Vec<u8>>>;

    /// Store a secret under the given id, replacing any previous value.
    fn store(&self, key_id: &str, value: &[u8]) -> Result<()>;
}

/// Raw identifiers from which the device identity is derived.
pub trait DeviceInfoSource: Send + Sync {
    /// Device model name.
    fn model(&self) -> String;

    /// Build signature of the OS image.
    fn build_fingerprint(&self) -> String;

    /// Hardware serial or similar privileged identifier.
    ///
    /// Returns `AttendGuardError::PermissionDenied` when the platform refuses
    /// access.
    fn hardware_serial(&self) -> Result<String>;
}

/// The local attendance record store (row store keyed by record id).
pub trait AttendanceStore: Send + Sync {
    fn get(&self, id: &RecordId) -> Result<Option<AttendanceRecord>>;

    /// Insert or replace a record.
    fn upsert(&self, record: &AttendanceRecord) -> Result<()>;

    /// All records for `user_id`, newest date first.
    fn records_for_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>>;

    fn all_records(&self) -> Result<Vec<AttendanceRecord>>;
}
