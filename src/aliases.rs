// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret types used throughout snapshot-sender.

pub use secure_gate::{
    dynamic_alias, fixed_alias, random_alias, SecureConversionsExt, SecureRandomExt,
};

// Fixed-size secrets
fixed_alias!(DataKey32, 32); // 256-bit plaintext data-encryption key
fixed_alias!(KeyEncryptionKey32, 32); // 256-bit key that wraps data keys

// Dynamic secrets
dynamic_alias!(PlainText, Vec<u8>); // decrypted record payload
dynamic_alias!(VaultPassphrase, String); // SQLCipher database passphrase

// Random secrets
random_alias!(RandomKey32, 32); // fresh key material from the OS RNG
