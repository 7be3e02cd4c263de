// src/db/vault_db_conn.rs
use std::{fs, path::Path};

use rusqlite::{Connection, Result};

use crate::aliases::VaultPassphrase;

use super::apply_cipher_key;

const VAULT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS key_encryption_keys (
    key_id     TEXT PRIMARY KEY,
    key_blob   BLOB NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    revoked_at TEXT
);
"#;

/// Open (or create) the key vault database
pub fn open_vault_db<P: AsRef<Path>>(
    db_path: P,
    passphrase: Option<&VaultPassphrase>,
) -> Result<Connection> {
    if let Some(parent) = db_path.as_ref().parent() {
        let _ = fs::create_dir_all(parent);
    }

    let conn = Connection::open(db_path)?;
    apply_cipher_key(&conn, passphrase)?;
    conn.execute_batch(VAULT_SCHEMA)?;

    Ok(conn)
}
