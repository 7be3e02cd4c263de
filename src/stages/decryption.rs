// src/stages/decryption.rs
use tracing::trace;

use crate::crypto::decrypt_payload;
use crate::enums::{EncryptionAlgorithm, FailureStage};
use crate::error::{CoreError, CryptoError, ProcessFailure};
use crate::model::{DecryptedRecord, EncryptedRecord};

/// Decrypts a key-annotated record's payload
#[derive(Debug, Default, Clone, Copy)]
pub struct DecryptionStage;

impl DecryptionStage {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, record: EncryptedRecord) -> Result<DecryptedRecord, ProcessFailure> {
        // Reaching here without a key means the stages ran out of order.
        let Some(key) = record.plaintext_key() else {
            return Err(failure(
                record.id.clone(),
                CoreError::ContractViolation(format!(
                    "record {} reached decryption without a plaintext key",
                    record.id
                )),
            ));
        };

        let result = record
            .algorithm
            .parse::<EncryptionAlgorithm>()
            .and_then(|algorithm| {
                decrypt_payload(algorithm, key, &record.nonce, &record.id, &record.payload)
            });

        match result {
            Ok(plaintext) => {
                trace!(record_id = %record.id, bytes = plaintext.expose_secret().len(), "payload decrypted");
                Ok(DecryptedRecord {
                    id: record.id,
                    position: record.position,
                    payload: plaintext,
                })
            }
            Err(source) => Err(payload_failure(record.id, source)),
        }
    }
}

fn payload_failure(record_id: String, source: CryptoError) -> ProcessFailure {
    failure(
        record_id.clone(),
        CoreError::PayloadDecryption { record_id, source },
    )
}

fn failure(record_id: String, error: CoreError) -> ProcessFailure {
    ProcessFailure {
        record_id,
        stage: FailureStage::Decryption,
        error,
    }
}
