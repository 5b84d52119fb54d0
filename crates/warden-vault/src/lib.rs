#![warn(missing_docs)]
//! # warden-vault
//!
//! ## Purpose
//! Confidentiality-at-rest for the credential triple in client-side
//! persistent storage.
//!
//! ## Responsibilities
//! - Seal plaintext values under a device-derived key before writing.
//! - Open sealed values on read, treating any failure as "absent".
//! - Delete raw values unconditionally.
//!
//! ## Data flow
//! The session layer calls [`Vault::put`]/[`Vault::get`]/[`Vault::remove`]
//! with storage key names; the vault delegates raw string I/O to an injected
//! [`SecretStore`] and applies the sealing layer in between.
//!
//! ## Ownership and lifetimes
//! The vault owns its derived key material and shares the backing store via
//! `Arc`, so session code can clone it freely across async call chains.
//!
//! ## Error model
//! Sealing failures are logged and absorbed: a failed `put` writes nothing
//! and a failed `get` returns `None`. Downstream treats either as "no
//! session", which keeps the store fail-closed without ever panicking.
//!
//! ## Security and privacy notes
//! Plaintext values, the device secret, and the derived key are never
//! logged. Only a short key fingerprint appears in diagnostics.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use warden_vault::{MemorySecretStore, Vault};
//!
//! let vault = Vault::new(Arc::new(MemorySecretStore::new()), Some("device-secret"));
//! vault.put("access_token", "opaque-token");
//! assert_eq!(vault.get("access_token").as_deref(), Some("opaque-token"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

/// Raw persistent key/value storage for sealed strings.
///
/// Implementations are synchronous and local: no network, no retries.
pub trait SecretStore: Send + Sync {
    /// Reads the raw value stored under `key`, if any.
    fn read(&self, key: &str) -> Option<String>;
    /// Writes `value` under `key`, replacing any prior value.
    fn write(&self, key: &str, value: String);
    /// Deletes the value under `key`; absent keys are ignored.
    fn delete(&self, key: &str);
}

/// In-memory [`SecretStore`] used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemorySecretStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn write(&self, key: &str, value: String) {
        self.entries().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// Sealing layer over a [`SecretStore`].
#[derive(Clone)]
pub struct Vault {
    store: Arc<dyn SecretStore>,
    key: Option<[u8; 32]>,
}

impl Vault {
    /// Creates a vault keyed by a device-scoped secret.
    ///
    /// A missing or blank secret leaves the vault keyless: every `put`
    /// becomes a logged no-op and every `get` resolves absent, which
    /// downstream is equivalent to "no session".
    pub fn new(store: Arc<dyn SecretStore>, device_secret: Option<&str>) -> Self {
        let key = device_secret
            .filter(|secret| !secret.trim().is_empty())
            .map(derive_key);

        if let Some(key) = &key {
            let fingerprint = key_fingerprint(key);
            tracing::debug!(fingerprint, "vault key derived from device secret");
        } else {
            tracing::warn!("no device secret configured; vault will not persist values");
        }

        Self { store, key }
    }

    /// Seals `plaintext` and writes it under `key`.
    ///
    /// # Side effects
    /// On sealing failure nothing is written; the prior value (if any) is
    /// left untouched and the failure is logged.
    pub fn put(&self, key: &str, plaintext: &str) {
        match self.seal(plaintext) {
            Ok(sealed) => self.store.write(key, sealed),
            Err(error) => {
                tracing::warn!(key, %error, "sealing failed; value not persisted");
            }
        }
    }

    /// Reads and opens the value under `key`.
    ///
    /// Returns `None` when the key is missing, the vault has no derived key,
    /// or the sealed value fails to open (including tampering).
    pub fn get(&self, key: &str) -> Option<String> {
        let sealed = self.store.read(key)?;
        match self.open(&sealed) {
            Ok(plaintext) => Some(plaintext),
            Err(error) => {
                tracing::debug!(key, %error, "sealed value could not be opened");
                None
            }
        }
    }

    /// Deletes the raw value under `key` unconditionally.
    pub fn remove(&self, key: &str) {
        self.store.delete(key);
    }

    fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let key = self.key.ok_or(VaultError::KeyUnavailable)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|error| VaultError::Entropy(error.to_string()))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| VaultError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    fn open(&self, sealed: &str) -> Result<String, VaultError> {
        let key = self.key.ok_or(VaultError::KeyUnavailable)?;

        let blob = STANDARD.decode(sealed).map_err(|_| VaultError::Open)?;
        if blob.len() <= NONCE_LEN {
            return Err(VaultError::Open);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Open)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Open)
    }
}

/// Internal sealing/opening failure classification.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No device secret was configured, so no key could be derived.
    #[error("device secret is not configured")]
    KeyUnavailable,
    /// The operating system entropy source failed.
    #[error("entropy source failure: {0}")]
    Entropy(String),
    /// The AEAD seal operation failed.
    #[error("value could not be sealed")]
    Seal,
    /// The sealed blob is malformed, truncated, or fails authentication.
    #[error("sealed value is malformed or fails authentication")]
    Open,
}

fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn key_fingerprint(key: &[u8; 32]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..4])
}
