// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device identity: a stable SHA-256 identifier for this installation.
//
// Material: model name, hardware serial and OS build signature.  When the
// serial is refused, a random per-installation token from secret storage
// takes its place, so permission-denied installations never share one
// identity.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use attendguard_bridge::{DeviceInfoSource, SecretStorage};
use attendguard_core::SecurityConfig;
use attendguard_core::types::DeviceId;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::integrity::hash_bytes;

/// Derives and caches the identifier of the current installation.
pub struct DeviceIdentityProvider {
    info: Arc<dyn DeviceInfoSource>,
    storage: Arc<dyn SecretStorage>,
    token_id: String,
    cached: OnceLock<DeviceId>,
    init: Mutex<()>,
}

impl DeviceIdentityProvider {
    pub fn new(
        info: Arc<dyn DeviceInfoSource>,
        storage: Arc<dyn SecretStorage>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            info,
            storage,
            token_id: config.installation_token_id.clone(),
            cached: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The identifier of this installation (64 lowercase hex characters).
    ///
    /// Deterministic for the life of the provider, and across restarts
    /// whenever the serial is readable or the fallback token was persisted.
    #[instrument(skip_all)]
    pub fn identify(&self) -> DeviceId {
        if let Some(id) = self.cached.get() {
            return id.clone();
        }

        // Guards only the token check-and-create; there is no data to poison.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = self.cached.get() {
            return id.clone();
        }

        let serial = match self.info.hardware_serial() {
            Ok(serial) if !serial.trim().is_empty() => serial,
            Ok(_) => {
                debug!("hardware serial empty; using installation token");
                self.installation_token()
            }
            Err(e) => {
                debug!(error = %e, "hardware serial unavailable; using installation token");
                self.installation_token()
            }
        };

        let material = identity_material(&[
            &self.info.model(),
            &serial,
            &self.info.build_fingerprint(),
        ]);
        let id = DeviceId::from_hex(hash_bytes(&material));
        let _ = self.cached.set(id.clone());
        id
    }

    /// Load the per-installation token, creating it on first use.
    ///
    /// A token is only written when storage reports none.  If the slot
    /// cannot be read, a session-only token is used and the stored one is
    /// left untouched.
    fn installation_token(&self) -> String {
        match self.storage.load(&self.token_id) {
            Ok(Some(token)) if !token.is_empty() => hex::encode(token),
            Ok(_) => {
                let token = *Uuid::new_v4().as_bytes();
                if let Err(e) = self.storage.store(&self.token_id, &token) {
                    warn!(
                        error = %e,
                        "installation token not persisted; device identity is session-scoped"
                    );
                }
                hex::encode(token)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "installation token unreadable; using a session-only device identity"
                );
                hex::encode(Uuid::new_v4().as_bytes())
            }
        }
    }
}

/// Length-prefixed concatenation, so no choice of component values can
/// shift a boundary.
fn identity_material(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(&(part.len() as u64).to_be_bytes());
        out.extend_from_slice(part.as_bytes());
    }
    out
}
