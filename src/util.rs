// src/util.rs
//! Small helpers shared by the sink and export code

use blake3::Hasher;

/// BLAKE3 hash as lowercase hex
pub fn blake3_hex(data: &[u8]) -> String {
    Hasher::new().update(data).finalize().to_hex().to_string()
}

/// Output file stem for a record id: the first `len` hex chars of its hash
pub fn output_id(record_id: &str, len: usize) -> String {
    let mut hex = blake3_hex(record_id.as_bytes());
    hex.truncate(len);
    hex
}
