//! Vault database operations
//!
//! Key-encryption keys live here; data keys never do. Revocation keeps the
//! row so that records wrapped under a revoked key fail as unauthorized
//! rather than unknown.

use rusqlite::{params, Connection};

use crate::aliases::KeyEncryptionKey32;
use crate::consts::KEY_LEN_32;

/// A key-encryption key as stored in the vault
pub struct StoredKeyEncryptionKey {
    pub key_id: String,
    pub key: KeyEncryptionKey32,
    pub revoked: bool,
}

/// Store (or replace) a key-encryption key
pub fn store_key_encryption_key(
    conn: &Connection,
    key_id: &str,
    key: &KeyEncryptionKey32,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO key_encryption_keys (key_id, key_blob, created_at, revoked_at)
         VALUES (?1, ?2, datetime('now'), NULL)",
        params![key_id, key.expose_secret() as &[u8]],
    )?;
    Ok(())
}

/// Mark a key-encryption key revoked; returns whether a row was updated
pub fn revoke_key_encryption_key(conn: &Connection, key_id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE key_encryption_keys SET revoked_at = datetime('now')
         WHERE key_id = ?1 AND revoked_at IS NULL",
        [key_id],
    )?;
    Ok(rows > 0)
}

/// Load all key-encryption keys; blobs of the wrong length are skipped
pub fn load_key_encryption_keys(
    conn: &Connection,
) -> rusqlite::Result<Vec<StoredKeyEncryptionKey>> {
    let mut stmt = conn.prepare(
        "SELECT key_id, key_blob, revoked_at IS NOT NULL FROM key_encryption_keys ORDER BY key_id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Vec<u8>>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    let mut keys = Vec::new();
    for row in rows {
        let (key_id, mut blob, revoked) = row?;
        let parsed: Option<[u8; KEY_LEN_32]> = blob.as_slice().try_into().ok();
        blob.iter_mut().for_each(|b| *b = 0);

        match parsed {
            Some(bytes) => keys.push(StoredKeyEncryptionKey {
                key_id,
                key: KeyEncryptionKey32::new(bytes),
                revoked,
            }),
            None => tracing::warn!(key_id = %key_id, "ignoring key-encryption key with invalid length"),
        }
    }
    Ok(keys)
}
