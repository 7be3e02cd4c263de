// src/lib.rs
//! snapshot-sender: chunked, fault-tolerant decryption of encrypted snapshot records
//!
//! Features:
//! - Fixed-size chunks with a durable, monotonic source cursor
//! - Two-stage per-record processing: key resolution, then AES-256-GCM decryption
//! - Skip budget for recoverable failures with a full audit log
//! - SQLCipher-backed record source and key vault, directory sink with manifest

pub mod aliases;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod export;
pub mod key_ops;
pub mod key_service;
pub mod model;
pub mod runner;
pub mod sink;
pub mod skip;
pub mod source;
pub mod stages;
pub mod util;

// Re-export everything users need at the crate root
pub use aliases::{DataKey32, KeyEncryptionKey32, PlainText, VaultPassphrase};
pub use config::load as load_config;
pub use enums::{EncryptionAlgorithm, FailureStage};
pub use error::{CoreError, ErrorKind, KeyServiceError, ProcessFailure, Result, SinkError};
pub use export::export_report_json;
pub use key_service::{KeyService, VaultKeyService};
pub use model::{DecryptedRecord, EncryptedRecord, SkipRecord, WrappedKey};
pub use runner::{ChunkRunner, ChunkRunnerBuilder, JobAborted, RunReport, RunState, StopHandle};
pub use sink::{DirectorySink, RecordSink};
pub use skip::{SkipBudget, SkipPolicy};
pub use source::{RecordSource, SqliteRecordSource};
pub use stages::CompositeProcessor;
