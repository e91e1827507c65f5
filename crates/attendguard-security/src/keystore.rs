// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secret key store: lazily creates the 256-bit payload key and persists it
// through the platform `SecretStorage`.
//
// The platform store offers no check-and-create atomicity, so the first
// creation runs under `init`.  Once a key is cached every later read is a
// lock-free `OnceLock` hit.

use std::sync::{Arc, Mutex, OnceLock};

use attendguard_bridge::SecretStorage;
use attendguard_core::SecurityConfig;
use attendguard_core::error::{AttendGuardError, Result};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, instrument, warn};

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key.  `Debug` never prints the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate(rng: &SystemRandom) -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        rng.fill(&mut bytes)
            .map_err(|_| AttendGuardError::KeyUnavailable("system RNG failed".into()))?;
        Ok(Self(bytes))
    }

    /// Parse stored key material.  Returns `None` unless exactly
    /// `KEY_LEN` bytes are supplied.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub(crate) fn from_array(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Whether the current key survives a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDurability {
    /// Loaded from or persisted to secret storage.
    Durable,
    /// Session-only fallback; payloads sealed with it become unreadable
    /// after the process exits.
    Ephemeral,
}

/// The key together with its durability, so callers can surface a
/// degraded-security warning.
#[derive(Debug, Clone)]
pub struct KeyHandle {
    key: SymmetricKey,
    durability: KeyDurability,
}

impl KeyHandle {
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn durability(&self) -> KeyDurability {
        self.durability
    }

    pub fn is_degraded(&self) -> bool {
        self.durability == KeyDurability::Ephemeral
    }
}

/// Get-or-create access to the installation's payload key.
pub struct SecretKeyStore {
    storage: Arc<dyn SecretStorage>,
    key_id: String,
    allow_ephemeral: bool,
    rng: SystemRandom,
    cached: OnceLock<KeyHandle>,
    init: Mutex<()>,
}

impl SecretKeyStore {
    pub fn new(storage: Arc<dyn SecretStorage>, config: &SecurityConfig) -> Self {
        Self {
            storage,
            key_id: config.key_id.clone(),
            allow_ephemeral: config.allow_ephemeral_key,
            rng: SystemRandom::new(),
            cached: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Return the installation key, creating and persisting it on first use.
    ///
    /// Concurrent first calls all observe the same key.  If secret storage
    /// is unusable and ephemeral keys are allowed, a session-only key is
    /// returned with `KeyDurability::Ephemeral`; otherwise
    /// `AttendGuardError::KeyUnavailable`.
    #[instrument(skip_all, fields(key_id = %self.key_id))]
    pub fn get_or_create_key(&self) -> Result<KeyHandle> {
        if let Some(handle) = self.cached.get() {
            return Ok(handle.clone());
        }

        let _guard = self
            .init
            .lock()
            .map_err(|_| AttendGuardError::KeyUnavailable("key store lock poisoned".into()))?;

        // Another caller may have finished while we waited.
        if let Some(handle) = self.cached.get() {
            return Ok(handle.clone());
        }

        let handle = self.load_or_create()?;
        let _ = self.cached.set(handle.clone());
        Ok(handle)
    }

    /// Durability of the cached key, or `None` before first use.
    pub fn durability(&self) -> Option<KeyDurability> {
        self.cached.get().map(KeyHandle::durability)
    }

    fn load_or_create(&self) -> Result<KeyHandle> {
        match self.storage.load(&self.key_id) {
            Ok(Some(bytes)) => match SymmetricKey::from_slice(&bytes) {
                Some(key) => {
                    debug!("loaded existing key");
                    Ok(KeyHandle {
                        key,
                        durability: KeyDurability::Durable,
                    })
                }
                None => self.degrade(
                    format!("stored key has {} bytes, expected {KEY_LEN}", bytes.len()),
                    None,
                ),
            },
            Ok(None) => {
                let key = SymmetricKey::generate(&self.rng)?;
                match self.storage.store(&self.key_id, key.as_bytes()) {
                    Ok(()) => {
                        info!("generated and persisted new key");
                        Ok(KeyHandle {
                            key,
                            durability: KeyDurability::Durable,
                        })
                    }
                    Err(e) => self.degrade(format!("persisting new key failed: {e}"), Some(key)),
                }
            }
            Err(e) => self.degrade(format!("loading key failed: {e}"), None),
        }
    }

    fn degrade(&self, reason: String, key: Option<SymmetricKey>) -> Result<KeyHandle> {
        if !self.allow_ephemeral {
            return Err(AttendGuardError::KeyUnavailable(reason));
        }

        warn!(%reason, "secret storage unusable; falling back to a session-only key");
        let key = match key {
            Some(key) => key,
            None => SymmetricKey::generate(&self.rng)?,
        };
        Ok(KeyHandle {
            key,
            durability: KeyDurability::Ephemeral,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendguard_bridge::memory::MemorySecretStorage;
    use attendguard_bridge::stub::StubBridge;

    fn config(allow_ephemeral_key: bool) -> SecurityConfig {
        SecurityConfig {
            allow_ephemeral_key,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn creates_once_then_reuses() {
        let storage = Arc::new(MemorySecretStorage::new());
        let store = SecretKeyStore::new(storage.clone(), &config(true));

        let first = store.get_or_create_key().unwrap();
        let second = store.get_or_create_key().unwrap();

        assert_eq!(first.key(), second.key());
        assert_eq!(first.durability(), KeyDurability::Durable);
        assert_eq!(storage.store_count(), 1);
    }

    #[test]
    fn survives_restart() {
        let storage = Arc::new(MemorySecretStorage::new());
        let key = SecretKeyStore::new(storage.clone(), &config(true))
            .get_or_create_key()
            .unwrap();

        let reopened = SecretKeyStore::new(storage, &config(true))
            .get_or_create_key()
            .unwrap();
        assert_eq!(key.key(), reopened.key());
    }

    #[test]
    fn unavailable_storage_degrades_to_ephemeral() {
        let store = SecretKeyStore::new(Arc::new(StubBridge), &config(true));
        assert_eq!(store.durability(), None);

        let handle = store.get_or_create_key().unwrap();
        assert!(handle.is_degraded());
        assert_eq!(store.durability(), Some(KeyDurability::Ephemeral));
        // The session key stays stable for the life of the store.
        assert_eq!(store.get_or_create_key().unwrap().key(), handle.key());
    }

    #[test]
    fn unavailable_storage_without_fallback_is_an_error() {
        let store = SecretKeyStore::new(Arc::new(StubBridge), &config(false));
        assert!(matches!(
            store.get_or_create_key(),
            Err(AttendGuardError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn corrupted_key_is_not_overwritten() {
        let storage = Arc::new(MemorySecretStorage::new());
        storage.store("attendance_key", b"short").unwrap();

        let store = SecretKeyStore::new(storage.clone(), &config(true));
        assert!(store.get_or_create_key().unwrap().is_degraded());
        assert_eq!(
            storage.load("attendance_key").unwrap().as_deref(),
            Some(&b"short"[..])
        );
    }

    #[test]
    fn debug_redacts_key_bytes() {
        let key = SymmetricKey::from_array([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(..)");
    }
}
