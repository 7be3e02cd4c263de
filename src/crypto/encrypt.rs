// src/crypto/encrypt.rs
//! Producer side of the record format, used for seeding sources and in tests

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::aliases::DataKey32;
use crate::consts::{KEY_LEN_32, NONCE_LEN_12};
use crate::error::CryptoError;

/// Ciphertext plus the nonce it was sealed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_LEN_12],
    pub ciphertext: Vec<u8>,
}

/// AEAD seal (encrypt) plaintext with nonce and AAD → `ciphertext || tag`
pub fn seal(
    key: &[u8],
    nonce_12: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce_12.len() != NONCE_LEN_12 {
        return Err(CryptoError::InvalidNonceLen {
            expected: NONCE_LEN_12,
            actual: nonce_12.len(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLen {
        expected: KEY_LEN_32,
        actual: key.len(),
    })?;

    cipher
        .encrypt(
            Nonce::from_slice(nonce_12),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Failure("AES-GCM seal failed".into()))
}

/// Encrypt a record payload under a fresh random nonce
pub fn encrypt_payload(
    key: &DataKey32,
    record_id: &str,
    plaintext: &[u8],
) -> Result<EncryptedPayload, CryptoError> {
    let nonce: [u8; NONCE_LEN_12] = rand::random();
    let ciphertext = seal(
        key.expose_secret().as_slice(),
        &nonce,
        record_id.as_bytes(),
        plaintext,
    )?;
    Ok(EncryptedPayload { nonce, ciphertext })
}
