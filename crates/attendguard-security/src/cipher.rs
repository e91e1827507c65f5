// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload cipher: AES-256-GCM (ring) with a fresh random 96-bit nonce per
// call.
//
// Wire layout: nonce (12 bytes) || ciphertext || tag (16 bytes).  The output
// is self-contained given the key.  Any failure is an error: plaintext is
// never returned in place of ciphertext, nor ciphertext in place of
// plaintext.

use std::sync::Arc;

use attendguard_core::error::{AttendGuardError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

use crate::keystore::{KeyDurability, SecretKeyStore, SymmetricKey};

/// Authentication tag length for AES-256-GCM.
pub const TAG_LEN: usize = 16;

/// Encrypts and decrypts opaque payloads under the installation key.
pub struct PayloadCipher {
    keys: Arc<SecretKeyStore>,
    rng: SystemRandom,
}

impl PayloadCipher {
    pub fn new(keys: Arc<SecretKeyStore>) -> Self {
        Self {
            keys,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext || tag`.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let handle = self.keys.get_or_create_key()?;
        let sealed = seal_with(handle.key(), &self.rng, b"", plaintext)?;
        debug!(ciphertext_len = sealed.len(), "encryption complete");
        Ok(sealed)
    }

    /// Decrypt output of [`PayloadCipher::encrypt`].
    ///
    /// Fails with `AttendGuardError::Decryption` when the data was sealed
    /// under a different key, or was truncated or modified.
    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let handle = self.keys.get_or_create_key()?;
        let plaintext = open_with(handle.key(), b"", ciphertext)?;
        debug!(plaintext_len = plaintext.len(), "decryption complete");
        Ok(plaintext)
    }

    /// [`PayloadCipher::encrypt`], rendered as standard base64.
    pub fn encrypt_to_base64(&self, plaintext: &[u8]) -> Result<String> {
        Ok(BASE64.encode(self.encrypt(plaintext)?))
    }

    /// Decode standard base64 and [`PayloadCipher::decrypt`].
    pub fn decrypt_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| AttendGuardError::InvalidPayload(format!("base64: {e}")))?;
        self.decrypt(&raw)
    }

    /// Durability of the key in use, creating it if needed.
    pub fn key_durability(&self) -> Result<KeyDurability> {
        Ok(self.keys.get_or_create_key()?.durability())
    }
}

fn aead_key(key: &SymmetricKey) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| AttendGuardError::KeyUnavailable("invalid AES-256 key length".into()))?;
    Ok(LessSafeKey::new(unbound))
}

/// AES-256-GCM seal with a random nonce, binding `aad`.
pub(crate) fn seal_with(
    key: &SymmetricKey,
    rng: &SystemRandom,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| AttendGuardError::Encryption("nonce generation failed".into()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| AttendGuardError::Encryption("AES-256-GCM seal failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Inverse of [`seal_with`]; `aad` must match.
pub(crate) fn open_with(key: &SymmetricKey, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(AttendGuardError::Decryption(format!(
            "ciphertext too short: {} bytes",
            sealed.len()
        )));
    }

    let key = aead_key(key)?;
    let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| AttendGuardError::Decryption("malformed nonce".into()))?;

    let mut in_out = body.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| {
            AttendGuardError::Decryption("authentication failed: wrong key or corrupted data".into())
        })?;
    Ok(plaintext.to_vec())
}
