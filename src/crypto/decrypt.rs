// src/crypto/decrypt.rs
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::aliases::{DataKey32, PlainText};
use crate::consts::{KEY_LEN_32, NONCE_LEN_12, TAG_LEN};
use crate::enums::EncryptionAlgorithm;
use crate::error::CryptoError;

/// AEAD open (decrypt) `ciphertext || tag` with nonce and AAD
///
/// Fails closed: no partial plaintext is ever returned.
pub fn open(
    key: &[u8],
    nonce_12: &[u8],
    aad: &[u8],
    ciphertext_and_tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if key.len() != KEY_LEN_32 {
        return Err(CryptoError::InvalidKeyLen {
            expected: KEY_LEN_32,
            actual: key.len(),
        });
    }
    if nonce_12.len() != NONCE_LEN_12 {
        return Err(CryptoError::InvalidNonceLen {
            expected: NONCE_LEN_12,
            actual: nonce_12.len(),
        });
    }
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(CryptoError::Truncated {
            len: ciphertext_and_tag.len(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLen {
        expected: KEY_LEN_32,
        actual: key.len(),
    })?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_12),
            Payload {
                msg: ciphertext_and_tag,
                aad,
            },
        )
        .map_err(|_| CryptoError::TagMismatch)
}

/// Decrypt a record payload with its resolved data key
///
/// The record id is the associated data, so a payload moved onto
/// another record fails authentication.
pub fn decrypt_payload(
    algorithm: EncryptionAlgorithm,
    key: &DataKey32,
    nonce: &[u8],
    record_id: &str,
    ciphertext: &[u8],
) -> Result<PlainText, CryptoError> {
    match algorithm {
        EncryptionAlgorithm::Aes256Gcm => {
            let plaintext = open(
                key.expose_secret().as_slice(),
                nonce,
                record_id.as_bytes(),
                ciphertext,
            )?;
            Ok(PlainText::new(plaintext))
        }
    }
}
