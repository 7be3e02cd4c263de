// src/stages/mod.rs
//! Per-record processing: key resolution, then payload decryption
//!
//! Stages are stateless transforms. Failures carry the stage that produced
//! them; deciding whether a failure is skipped belongs to the runner.

pub mod composite;
pub mod decryption;
pub mod key_resolution;

pub use composite::CompositeProcessor;
pub use decryption::DecryptionStage;
pub use key_resolution::KeyResolutionStage;
