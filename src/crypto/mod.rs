// src/crypto/mod.rs
//! AES-256-GCM primitives
//!
//! No I/O and no database. Payloads are bound to their
//! record id through the associated data; wrapped data keys are bound to the
//! id of the key-encryption key that wrapped them.

pub mod decrypt;
pub mod encrypt;
pub mod wrap;

pub use decrypt::{decrypt_payload, open};
pub use encrypt::{encrypt_payload, seal, EncryptedPayload};
pub use wrap::{unwrap_data_key, wrap_data_key};
