// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// At-rest protected secret storage: SQLite rows wrapped with AES-256-GCM.
//
// The wrapping key is derived from an installation passphrase with
// PBKDF2-HMAC-SHA256.  Salt and iteration count are fixed when the database
// is created and read back on every open, so a later config change cannot
// orphan stored secrets.  Each row binds its `key_id` as AAD, so values
// cannot be swapped between slots.
//
// Schema:
//   store_meta(
//     name  TEXT PRIMARY KEY,   -- "kdf_salt" | "kdf_iterations"
//     value BLOB NOT NULL
//   )
//   secrets(
//     key_id     TEXT PRIMARY KEY,
//     sealed     BLOB NOT NULL,   -- nonce || ciphertext || tag
//     updated_at TEXT NOT NULL    -- RFC 3339
//   )

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Mutex;

use attendguard_bridge::SecretStorage;
use attendguard_core::error::{AttendGuardError, Result};
use chrono::Utc;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use crate::cipher::{open_with, seal_with};
use crate::keystore::{KEY_LEN, SymmetricKey};

const SALT_LEN: usize = 16;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS store_meta (
        name  TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS secrets (
        key_id     TEXT PRIMARY KEY,
        sealed     BLOB NOT NULL,
        updated_at TEXT NOT NULL
    );";

/// Convert a `rusqlite::Error` into an `AttendGuardError::Database`.
fn db_err(e: rusqlite::Error) -> AttendGuardError {
    AttendGuardError::Database(e.to_string())
}

/// Passphrase-protected secret storage backed by SQLite.
///
/// `rusqlite::Connection` is `Send` but not `Sync`; it lives behind a mutex
/// so the store can be shared as `Arc<dyn SecretStorage>`.
pub struct SqliteSecretStorage {
    conn: Mutex<Connection>,
    wrapping_key: SymmetricKey,
    rng: SystemRandom,
}

impl SqliteSecretStorage {
    /// Open (or create) the secret database at `path`.
    ///
    /// `kdf_iterations` only applies when the database is created.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, passphrase: &str, kdf_iterations: u32) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        Self::init(conn, passphrase, kdf_iterations)
    }

    /// Open an in-memory secret database (useful for tests).
    pub fn open_in_memory(passphrase: &str, kdf_iterations: u32) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, passphrase, kdf_iterations)
    }

    fn init(conn: Connection, passphrase: &str, kdf_iterations: u32) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        let rng = SystemRandom::new();

        let salt = match meta(&conn, "kdf_salt")? {
            Some(salt) => salt,
            None => {
                let mut salt = [0u8; SALT_LEN];
                rng.fill(&mut salt)
                    .map_err(|_| AttendGuardError::KeyUnavailable("system RNG failed".into()))?;
                set_meta(&conn, "kdf_salt", &salt)?;
                salt.to_vec()
            }
        };

        let iterations = match meta(&conn, "kdf_iterations")? {
            Some(raw) => {
                let bytes = <[u8; 4]>::try_from(raw.as_slice()).map_err(|_| {
                    AttendGuardError::KeyUnavailable("corrupted kdf_iterations".into())
                })?;
                u32::from_be_bytes(bytes)
            }
            None => {
                set_meta(&conn, "kdf_iterations", &kdf_iterations.to_be_bytes())?;
                kdf_iterations
            }
        };
        let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
            AttendGuardError::KeyUnavailable("kdf iterations must be non-zero".into())
        })?;

        let mut derived = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            passphrase.as_bytes(),
            &mut derived,
        );

        debug!(iterations = iterations.get(), "secret store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            wrapping_key: SymmetricKey::from_array(derived),
            rng,
        })
    }

    /// Number of stored secrets.
    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM secrets", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AttendGuardError::Database("secret store lock poisoned".into()))
    }
}

impl SecretStorage for SqliteSecretStorage {
    #[instrument(skip(self))]
    fn load(&self, key_id: &str) -> Result<Option<Vec<u8>>> {
        let sealed: Option<Vec<u8>> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT sealed FROM secrets WHERE key_id = ?1",
                params![key_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?
        };

        match sealed {
            Some(sealed) => Ok(Some(open_with(
                &self.wrapping_key,
                key_id.as_bytes(),
                &sealed,
            )?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    fn store(&self, key_id: &str, value: &[u8]) -> Result<()> {
        let sealed = seal_with(&self.wrapping_key, &self.rng, key_id.as_bytes(), value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO secrets (key_id, sealed, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key_id) DO UPDATE SET sealed = excluded.sealed,
                                               updated_at = excluded.updated_at",
            params![key_id, sealed, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        debug!("secret stored");
        Ok(())
    }
}

fn meta(conn: &Connection, name: &str) -> Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM store_meta WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

fn set_meta(conn: &Connection, name: &str, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO store_meta (name, value) VALUES (?1, ?2)",
        params![name, value],
    )
    .map_err(db_err)?;
    Ok(())
}
