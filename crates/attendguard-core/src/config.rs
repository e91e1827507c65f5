// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Integrity-layer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Secret-storage slot holding the payload encryption key.
    pub key_id: String,
    /// Secret-storage slot holding the per-installation fallback token used
    /// when the hardware serial cannot be read.
    pub installation_token_id: String,
    /// Fall back to a session-only key when secret storage is unusable.
    /// When false, key failures abort the seal call instead.
    pub allow_ephemeral_key: bool,
    /// PBKDF2 iterations for the SQLite secret store's wrapping key.
    pub kdf_iterations: u32,
    /// SQLite secret store file name inside the data directory.
    pub secret_db_file: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            key_id: "attendance_key".into(),
            installation_token_id: "installation_token".into(),
            allow_ephemeral_key: true,
            kdf_iterations: 100_000,
            secret_db_file: "secrets.db".into(),
        }
    }
}

impl SecurityConfig {
    /// Load `config.json` from `data_dir`, or `None` if it is missing or
    /// unreadable.
    pub fn load(data_dir: &Path) -> Option<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let data = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Write `config.json` into `data_dir`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}
