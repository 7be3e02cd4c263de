// src/crypto/wrap.rs
//! Data-key wrapping: `nonce(12) || AES-256-GCM(kek, dek, aad = kek id)`

use crate::aliases::{DataKey32, KeyEncryptionKey32, PlainText};
use crate::consts::{KEY_LEN_32, NONCE_LEN_12, TAG_LEN};
use crate::error::CryptoError;

use super::{open, seal};

/// Wrap a data key under a key-encryption key
pub fn wrap_data_key(
    kek: &KeyEncryptionKey32,
    kek_id: &str,
    data_key: &DataKey32,
) -> Result<Vec<u8>, CryptoError> {
    let nonce: [u8; NONCE_LEN_12] = rand::random();
    let sealed = seal(
        kek.expose_secret().as_slice(),
        &nonce,
        kek_id.as_bytes(),
        data_key.expose_secret().as_slice(),
    )?;

    let mut out = Vec::with_capacity(NONCE_LEN_12 + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Recover a data key wrapped by [`wrap_data_key`]
pub fn unwrap_data_key(
    kek: &KeyEncryptionKey32,
    kek_id: &str,
    wrapped: &[u8],
) -> Result<DataKey32, CryptoError> {
    if wrapped.len() < NONCE_LEN_12 + TAG_LEN {
        return Err(CryptoError::Truncated { len: wrapped.len() });
    }
    let (nonce, sealed) = wrapped.split_at(NONCE_LEN_12);
    let raw = PlainText::new(open(
        kek.expose_secret().as_slice(),
        nonce,
        kek_id.as_bytes(),
        sealed,
    )?);

    let raw = raw.expose_secret();
    let bytes: [u8; KEY_LEN_32] =
        raw.as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLen {
                expected: KEY_LEN_32,
                actual: raw.len(),
            })?;
    Ok(DataKey32::new(bytes))
}
