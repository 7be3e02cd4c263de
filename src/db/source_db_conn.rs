// src/db/source_db_conn.rs
use std::{fs, path::Path};

use rusqlite::{Connection, Result};

use crate::aliases::VaultPassphrase;

use super::apply_cipher_key;

const SOURCE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshot_records (
    seq                   INTEGER PRIMARY KEY,
    record_id             TEXT NOT NULL,
    algorithm             TEXT NOT NULL DEFAULT 'AES-256-GCM',
    nonce                 BLOB NOT NULL,
    key_encryption_key_id TEXT NOT NULL,
    wrapped_key           BLOB NOT NULL,
    payload               BLOB NOT NULL,
    created_at            TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS job_checkpoints (
    job_name     TEXT NOT NULL,
    step_name    TEXT NOT NULL,
    next_seq     INTEGER NOT NULL,
    committed_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (job_name, step_name)
);

CREATE INDEX IF NOT EXISTS idx_snapshot_records_record_id ON snapshot_records(record_id);
"#;

/// Open (or create) the encrypted-record source database
pub fn open_source_db<P: AsRef<Path>>(
    db_path: P,
    passphrase: Option<&VaultPassphrase>,
) -> Result<Connection> {
    if let Some(parent) = db_path.as_ref().parent() {
        let _ = fs::create_dir_all(parent);
    }

    let conn = Connection::open(db_path)?;
    apply_cipher_key(&conn, passphrase)?;
    conn.execute_batch(SOURCE_SCHEMA)?;

    Ok(conn)
}

/// In-memory source database with the same schema
pub fn open_source_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SOURCE_SCHEMA)?;
    Ok(conn)
}
