// src/error.rs
//! Public error types for the entire crate

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::FailureStage;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Coarse classification used by the skip policy and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    KeyDecryptionFailure,
    PayloadDecryptionFailure,
    SinkWriteFailure,
    ContractViolation,
    SourceFailure,
    Infrastructure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::KeyDecryptionFailure => "KeyDecryptionFailure",
            ErrorKind::PayloadDecryptionFailure => "PayloadDecryptionFailure",
            ErrorKind::SinkWriteFailure => "SinkWriteFailure",
            ErrorKind::ContractViolation => "ContractViolation",
            ErrorKind::SourceFailure => "SourceFailure",
            ErrorKind::Infrastructure => "Infrastructure",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("data key for record {record_id} could not be resolved: {source}")]
    KeyDecryption {
        record_id: String,
        #[source]
        source: KeyServiceError,
    },

    #[error("payload of record {record_id} could not be decrypted: {source}")]
    PayloadDecryption {
        record_id: String,
        #[source]
        source: CryptoError,
    },

    #[error("sink rejected batch of {batch_len} record(s): {source}")]
    SinkWrite {
        batch_len: usize,
        #[source]
        source: SinkError,
    },

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("record source failure: {0}")]
    Source(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::KeyDecryption { .. } => ErrorKind::KeyDecryptionFailure,
            CoreError::PayloadDecryption { .. } => ErrorKind::PayloadDecryptionFailure,
            CoreError::SinkWrite { .. } => ErrorKind::SinkWriteFailure,
            CoreError::ContractViolation(_) => ErrorKind::ContractViolation,
            CoreError::Source(_) => ErrorKind::SourceFailure,
            CoreError::Config(_)
            | CoreError::Io(_)
            | CoreError::Sql(_)
            | CoreError::Json(_)
            | CoreError::Toml(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Failures reported by a key-decryption service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyServiceError {
    #[error("not authorized to use key-encryption key {key_id}")]
    Unauthorized { key_id: String },

    #[error("key-encryption key {key_id} not found")]
    KeyNotFound { key_id: String },

    #[error("wrapped key material is corrupted: {0}")]
    Corrupted(String),

    #[error("key service timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("key service unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a record sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),

    #[error("sink timed out after {millis} ms")]
    Timeout { millis: u64 },
}

/// Authenticated encryption failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    #[error("invalid nonce length: expected={expected}, actual={actual}")]
    InvalidNonceLen { expected: usize, actual: usize },

    #[error("ciphertext too short: {len} byte(s)")]
    Truncated { len: usize },

    #[error("AEAD tag mismatch")]
    TagMismatch,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("crypto failure: {0}")]
    Failure(String),
}

/// A per-record processing failure, tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("record {record_id} failed at {stage}: {error}")]
pub struct ProcessFailure {
    pub record_id: String,
    pub stage: FailureStage,
    #[source]
    pub error: CoreError,
}

impl ProcessFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
