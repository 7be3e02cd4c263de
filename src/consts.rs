// src/consts.rs
//! Shared constants: job defaults and security parameters

/// Records per chunk when the job does not configure one
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Upper bound on slots reserved up front for a chunk; larger chunks grow as they fill
pub const MAX_CHUNK_PREALLOC: usize = 1024;

/// Job name used for checkpoints and logs
pub const DEFAULT_JOB_NAME: &str = "snapshotSenderJob";

/// Step name used for checkpoints and logs
pub const DEFAULT_STEP_NAME: &str = "step";

/// Recommended KDF iterations for SQLCipher databases (2025+)
// ~0.1-0.2s on modern hardware
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// AES-256 key length in bytes
pub const KEY_LEN_32: usize = 32;

/// Standard 12-byte nonce length for AES-GCM
pub const NONCE_LEN_12: usize = 12;

/// Fixed AEAD tag length (bytes)
pub const TAG_LEN: usize = 16;

/// Number of hex characters of the record-id hash used in output file names
pub const OUTPUT_ID_LENGTH_HEX: usize = 20;

/// Extension of decrypted payload files written by the directory sink
pub const OUTPUT_FILE_EXTENSION: &str = "dec";

/// Name of the append-only manifest written by the directory sink
pub const MANIFEST_FILE_NAME: &str = "manifest.jsonl";
