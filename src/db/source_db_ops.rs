//! Source database operations: seeding records and the durable job cursor

use rusqlite::{params, Connection, OptionalExtension};

use crate::enums::EncryptionAlgorithm;
use crate::model::{EncryptedRecord, WrappedKey};

/// Append an encrypted record; returns its sequence number (source position)
pub fn insert_record(
    conn: &Connection,
    record_id: &str,
    algorithm: EncryptionAlgorithm,
    nonce: &[u8],
    wrapped_key: &WrappedKey,
    payload: &[u8],
) -> rusqlite::Result<u64> {
    conn.execute(
        "INSERT INTO snapshot_records
            (record_id, algorithm, nonce, key_encryption_key_id, wrapped_key, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record_id,
            algorithm.as_str(),
            nonce,
            &wrapped_key.key_encryption_key_id,
            &wrapped_key.ciphertext,
            payload,
        ],
    )?;
    Ok(conn.last_insert_rowid() as u64)
}

/// One row of `snapshot_records`
pub struct RawRecordRow {
    pub seq: u64,
    pub record_id: String,
    pub algorithm: String,
    pub nonce: Vec<u8>,
    pub key_encryption_key_id: String,
    pub wrapped_key: Vec<u8>,
    pub payload: Vec<u8>,
}

impl RawRecordRow {
    pub fn into_record(self) -> EncryptedRecord {
        EncryptedRecord::new(
            self.record_id,
            self.seq,
            self.algorithm,
            self.nonce,
            self.payload,
            WrappedKey::new(self.key_encryption_key_id, self.wrapped_key),
        )
    }
}

/// First record at or after `from_seq`
pub fn fetch_record_from(conn: &Connection, from_seq: u64) -> rusqlite::Result<Option<RawRecordRow>> {
    conn.query_row(
        "SELECT seq, record_id, algorithm, nonce, key_encryption_key_id, wrapped_key, payload
         FROM snapshot_records
         WHERE seq >= ?1
         ORDER BY seq
         LIMIT 1",
        [from_seq as i64],
        |row| {
            Ok(RawRecordRow {
                seq: row.get::<_, i64>(0)? as u64,
                record_id: row.get(1)?,
                algorithm: row.get(2)?,
                nonce: row.get(3)?,
                key_encryption_key_id: row.get(4)?,
                wrapped_key: row.get(5)?,
                payload: row.get(6)?,
            })
        },
    )
    .optional()
}

pub fn count_records(conn: &Connection) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM snapshot_records", [], |r| r.get(0))?;
    Ok(n as u64)
}

/// Last committed cursor for a job step (None if the step never committed)
pub fn read_checkpoint(
    conn: &Connection,
    job_name: &str,
    step_name: &str,
) -> rusqlite::Result<Option<u64>> {
    conn.query_row(
        "SELECT next_seq FROM job_checkpoints WHERE job_name = ?1 AND step_name = ?2",
        params![job_name, step_name],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.map(|n| n as u64))
}

pub fn write_checkpoint(
    conn: &Connection,
    job_name: &str,
    step_name: &str,
    next_seq: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO job_checkpoints (job_name, step_name, next_seq, committed_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(job_name, step_name)
         DO UPDATE SET next_seq = excluded.next_seq, committed_at = excluded.committed_at",
        params![job_name, step_name, next_seq as i64],
    )?;
    Ok(())
}
