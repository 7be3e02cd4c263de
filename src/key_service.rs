// src/key_service.rs
//! Key-decryption service: turns wrapped key material into a plaintext data key
//!
//! [`KeyService`] is the capability the pipeline consumes. [`VaultKeyService`]
//! is the bundled implementation backed by key-encryption keys held in the
//! SQLCipher vault database.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::debug;

use crate::aliases::{DataKey32, KeyEncryptionKey32};
use crate::crypto::unwrap_data_key;
use crate::db::vault_db_ops::load_key_encryption_keys;
use crate::error::{CryptoError, KeyServiceError};
use crate::model::WrappedKey;

pub trait KeyService {
    fn resolve_key(&self, wrapped: &WrappedKey) -> Result<DataKey32, KeyServiceError>;
}

impl<K: KeyService + ?Sized> KeyService for &K {
    fn resolve_key(&self, wrapped: &WrappedKey) -> Result<DataKey32, KeyServiceError> {
        (**self).resolve_key(wrapped)
    }
}

impl<K: KeyService + ?Sized> KeyService for Box<K> {
    fn resolve_key(&self, wrapped: &WrappedKey) -> Result<DataKey32, KeyServiceError> {
        (**self).resolve_key(wrapped)
    }
}

struct VaultEntry {
    key: KeyEncryptionKey32,
    revoked: bool,
}

/// Key-encryption keys by id; zeroized on drop
#[derive(Default)]
pub struct VaultKeyService {
    keys: HashMap<String, VaultEntry>,
}

impl VaultKeyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every key-encryption key stored in the vault database
    pub fn from_vault_db(conn: &Connection) -> rusqlite::Result<Self> {
        let mut service = Self::new();
        for stored in load_key_encryption_keys(conn)? {
            service.keys.insert(
                stored.key_id,
                VaultEntry {
                    key: stored.key,
                    revoked: stored.revoked,
                },
            );
        }
        debug!(keys = service.keys.len(), "key vault loaded");
        Ok(service)
    }

    pub fn with_key(mut self, key_id: impl Into<String>, key: KeyEncryptionKey32) -> Self {
        self.insert(key_id, key);
        self
    }

    pub fn insert(&mut self, key_id: impl Into<String>, key: KeyEncryptionKey32) {
        self.keys.insert(key_id.into(), VaultEntry { key, revoked: false });
    }

    /// Revoked keys stay known but refuse to unwrap; returns false for unknown ids
    pub fn revoke(&mut self, key_id: &str) -> bool {
        match self.keys.get_mut(key_id) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyService for VaultKeyService {
    fn resolve_key(&self, wrapped: &WrappedKey) -> Result<DataKey32, KeyServiceError> {
        let key_id = &wrapped.key_encryption_key_id;
        let entry = self
            .keys
            .get(key_id)
            .ok_or_else(|| KeyServiceError::KeyNotFound {
                key_id: key_id.clone(),
            })?;

        if entry.revoked {
            return Err(KeyServiceError::Unauthorized {
                key_id: key_id.clone(),
            });
        }

        unwrap_data_key(&entry.key, key_id, &wrapped.ciphertext).map_err(|e| match e {
            CryptoError::TagMismatch => {
                KeyServiceError::Corrupted(format!("authentication failed under key {key_id}"))
            }
            other => KeyServiceError::Corrupted(other.to_string()),
        })
    }
}
