// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// Secret storage always reports `PlatformUnavailable`, which drives the key
// store into its session-only fallback.  Device information is read from
// the host where possible.

use attendguard_core::error::{AttendGuardError, Result};

use crate::traits::*;

/// Host file holding a stable per-machine id on most Linux systems.
const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }
}

impl SecretStorage for StubBridge {
    fn load(&self, _key_id: &str) -> Result<Option<Vec<u8>>> {
        tracing::warn!("SecretStorage::load called on stub bridge");
        Err(AttendGuardError::PlatformUnavailable)
    }

    fn store(&self, _key_id: &str, _value: &[u8]) -> Result<()> {
        tracing::warn!("SecretStorage::store called on stub bridge");
        Err(AttendGuardError::PlatformUnavailable)
    }
}

impl DeviceInfoSource for StubBridge {
    fn model(&self) -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }

    fn build_fingerprint(&self) -> String {
        concat!("attendguard/", env!("CARGO_PKG_VERSION")).to_owned()
    }

    fn hardware_serial(&self) -> Result<String> {
        let id = std::fs::read_to_string(MACHINE_ID_PATH)
            .map_err(|e| AttendGuardError::PermissionDenied(format!("{MACHINE_ID_PATH}: {e}")))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(AttendGuardError::PermissionDenied(format!(
                "{MACHINE_ID_PATH} is empty"
            )));
        }
        Ok(id.to_owned())
    }
}
