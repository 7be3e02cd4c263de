// src/model.rs
//! Records flowing through the pipeline

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aliases::{DataKey32, PlainText};
use crate::consts::MAX_CHUNK_PREALLOC;
use crate::enums::FailureStage;
use crate::error::{CoreError, ErrorKind};

/// Wrapped (encrypted) data-encryption key plus the id of the key that wrapped it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub key_encryption_key_id: String,
    pub ciphertext: Vec<u8>,
}

impl WrappedKey {
    pub fn new(key_encryption_key_id: impl Into<String>, ciphertext: Vec<u8>) -> Self {
        Self {
            key_encryption_key_id: key_encryption_key_id.into(),
            ciphertext,
        }
    }
}

/// An encrypted snapshot entry as read from the source
///
/// Immutable once read; key resolution consumes it and returns a new value.
pub struct EncryptedRecord {
    pub id: String,
    /// Position of this record in the source; the commit point after it is `position + 1`.
    pub position: u64,
    /// Algorithm name as declared by the producer; parsed at decryption time
    pub algorithm: String,
    pub nonce: Vec<u8>,
    pub payload: Vec<u8>,
    pub wrapped_key: WrappedKey,
    plaintext_key: Option<DataKey32>,
}

impl EncryptedRecord {
    pub fn new(
        id: impl Into<String>,
        position: u64,
        algorithm: impl Into<String>,
        nonce: Vec<u8>,
        payload: Vec<u8>,
        wrapped_key: WrappedKey,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            algorithm: algorithm.into(),
            nonce,
            payload,
            wrapped_key,
            plaintext_key: None,
        }
    }

    /// Attach a resolved data key, producing the annotated record
    pub fn with_plaintext_key(self, key: DataKey32) -> Self {
        Self {
            plaintext_key: Some(key),
            ..self
        }
    }

    pub fn plaintext_key(&self) -> Option<&DataKey32> {
        self.plaintext_key.as_ref()
    }

    pub fn has_plaintext_key(&self) -> bool {
        self.plaintext_key.is_some()
    }
}

impl fmt::Debug for EncryptedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedRecord")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("algorithm", &self.algorithm)
            .field("payload_len", &self.payload.len())
            .field("key_encryption_key_id", &self.wrapped_key.key_encryption_key_id)
            .field("key_resolved", &self.has_plaintext_key())
            .finish()
    }
}

/// Decrypted payload ready for the sink
pub struct DecryptedRecord {
    pub id: String,
    pub position: u64,
    pub payload: PlainText,
}

impl DecryptedRecord {
    pub fn new(id: impl Into<String>, position: u64, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            position,
            payload: PlainText::new(payload),
        }
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.expose_secret().as_slice()
    }
}

impl fmt::Debug for DecryptedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedRecord")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

/// Ordered, bounded batch of records processed and committed as one unit
#[derive(Debug)]
pub struct Chunk<T> {
    index: u64,
    capacity: usize,
    items: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn new(index: u64, capacity: usize) -> Self {
        Self {
            index,
            capacity,
            items: Vec::with_capacity(capacity.min(MAX_CHUNK_PREALLOC)),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Returns the item back if the chunk is already full
    pub fn push(&mut self, item: T) -> std::result::Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Audit entry for a record dropped from the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub record_id: String,
    pub stage: FailureStage,
    pub kind: ErrorKind,
    pub message: String,
    pub chunk_index: u64,
    pub skipped_at: DateTime<Utc>,
}

impl SkipRecord {
    pub fn new(
        record_id: impl Into<String>,
        stage: FailureStage,
        error: &CoreError,
        chunk_index: u64,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            stage,
            kind: error.kind(),
            message: error.to_string(),
            chunk_index,
            skipped_at: Utc::now(),
        }
    }
}
