// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process implementations of the bridge contracts.
//
// Used for simulated devices in tests and by embedders that keep records in
// memory.  `MemorySecretStorage` deliberately provides no check-and-create
// atomicity, matching the platform keystores it stands in for.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use attendguard_core::error::{AttendGuardError, Result};
use attendguard_core::types::{AttendanceRecord, RecordId};

use crate::traits::*;

fn poisoned(what: &str) -> AttendGuardError {
    AttendGuardError::Bridge(format!("{what} lock poisoned"))
}

/// Secret storage backed by a `HashMap`.
#[derive(Default)]
pub struct MemorySecretStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    stores: AtomicUsize,
    latency: Option<Duration>,
}

impl MemorySecretStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every load and store, widening race
    /// windows for concurrency tests.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Number of successful `store` calls so far.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl SecretStorage for MemorySecretStorage {
    fn load(&self, key_id: &str) -> Result<Option<Vec<u8>>> {
        self.pause();
        let entries = self.entries.lock().map_err(|_| poisoned("secret storage"))?;
        Ok(entries.get(key_id).cloned())
    }

    fn store(&self, key_id: &str, value: &[u8]) -> Result<()> {
        self.pause();
        let mut entries = self.entries.lock().map_err(|_| poisoned("secret storage"))?;
        entries.insert(key_id.to_owned(), value.to_vec());
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Device information with fixed values, for simulating installations.
#[derive(Debug, Clone)]
pub struct FixedDeviceInfo {
    pub model: String,
    /// `None` simulates a denied serial permission.
    pub serial: Option<String>,
    pub build_fingerprint: String,
}

impl FixedDeviceInfo {
    pub fn new(model: impl Into<String>, serial: Option<&str>) -> Self {
        Self {
            model: model.into(),
            serial: serial.map(str::to_owned),
            build_fingerprint: "test/build:14/UP1A/release-keys".into(),
        }
    }
}

impl DeviceInfoSource for FixedDeviceInfo {
    fn model(&self) -> String {
        self.model.clone()
    }

    fn build_fingerprint(&self) -> String {
        self.build_fingerprint.clone()
    }

    fn hardware_serial(&self) -> Result<String> {
        self.serial
            .clone()
            .ok_or_else(|| AttendGuardError::PermissionDenied("READ_PRIVILEGED_PHONE_STATE".into()))
    }
}

/// Attendance record store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: Mutex<HashMap<RecordId, AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttendanceStore for MemoryAttendanceStore {
    fn get(&self, id: &RecordId) -> Result<Option<AttendanceRecord>> {
        let records = self.records.lock().map_err(|_| poisoned("record store"))?;
        Ok(records.get(id).cloned())
    }

    fn upsert(&self, record: &AttendanceRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| poisoned("record store"))?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn records_for_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        let records = self.records.lock().map_err(|_| poisoned("record store"))?;
        let mut out: Vec<AttendanceRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(out)
    }

    fn all_records(&self) -> Result<Vec<AttendanceRecord>> {
        let records = self.records.lock().map_err(|_| poisoned("record store"))?;
        Ok(records.values().cloned().collect())
    }
}
