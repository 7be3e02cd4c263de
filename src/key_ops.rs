// src/key_ops.rs
//! Key generation and text representations
//!
//! Key-encryption keys enter and leave the vault as hex or base64 text
//! (CLI import, operator display). Data keys are only ever generated here.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use std::fmt;

use crate::aliases::{
    DataKey32, KeyEncryptionKey32, PlainText, RandomKey32, SecureConversionsExt, SecureRandomExt,
};
use crate::consts::KEY_LEN_32;
use crate::error::CryptoError;

/// Generate a new random 256-bit key-encryption key
#[inline]
pub fn generate_key_encryption_key() -> KeyEncryptionKey32 {
    KeyEncryptionKey32::new(**RandomKey32::new())
}

/// Generate a new random 256-bit data key
#[inline]
pub fn generate_data_key() -> DataKey32 {
    DataKey32::new(**RandomKey32::new())
}

/// String representations of a key for export/display
#[derive(Clone)]
pub struct KeyRepr {
    pub hex: String,
    pub base64: String,
    pub base64url_no_pad: String,
}

impl fmt::Debug for KeyRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRepr")
            .field("hex", &"<redacted>")
            .field("base64", &"<redacted>")
            .field("base64url_no_pad", &"<redacted>")
            .finish()
    }
}

pub fn key_representations(key: &KeyEncryptionKey32) -> KeyRepr {
    let bytes = key.expose_secret();
    KeyRepr {
        hex: bytes.to_hex(),
        base64: STANDARD.encode(bytes),
        base64url_no_pad: URL_SAFE_NO_PAD.encode(bytes),
    }
}

/// Parse a key-encryption key from 64 hex chars or standard base64
pub fn parse_key_encryption_key(text: &str) -> Result<KeyEncryptionKey32, CryptoError> {
    let text = text.trim();
    let decoded = if text.len() == KEY_LEN_32 * 2 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(text).map_err(|e| CryptoError::Failure(format!("invalid hex key: {e}")))?
    } else {
        STANDARD
            .decode(text)
            .map_err(|e| CryptoError::Failure(format!("key is neither hex nor base64: {e}")))?
    };
    let decoded = PlainText::new(decoded);

    let bytes: [u8; KEY_LEN_32] = decoded
        .expose_secret()
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLen {
            expected: KEY_LEN_32,
            actual: decoded.expose_secret().len(),
        })?;
    Ok(KeyEncryptionKey32::new(bytes))
}
