// src/db/mod.rs
//! SQLCipher-backed storage: the encrypted-record source and the key vault

pub mod source_db_conn;
pub mod source_db_ops;
pub mod vault_db_conn;
pub mod vault_db_ops;

use rusqlite::Connection;

use crate::aliases::VaultPassphrase;
use crate::consts::DB_KDF_ITERATIONS;

/// Unlock a SQLCipher database; without a passphrase the file stays plain SQLite
pub(crate) fn apply_cipher_key(
    conn: &Connection,
    passphrase: Option<&VaultPassphrase>,
) -> rusqlite::Result<()> {
    let Some(passphrase) = passphrase else {
        return Ok(());
    };
    let key = passphrase.expose_secret().replace('\'', "''");

    conn.execute_batch(&format!("PRAGMA key = '{key}';"))?;
    conn.execute_batch(&format!(
        r#"
        PRAGMA cipher_page_size = 4096;
        PRAGMA kdf_iter = {DB_KDF_ITERATIONS};
        PRAGMA cipher_hmac_algorithm = HMAC_SHA512;
        PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA512;
        PRAGMA cipher_plaintext_header_size = 0;
        "#
    ))
}
