// src/stages/key_resolution.rs
use tracing::trace;

use crate::enums::FailureStage;
use crate::error::{CoreError, ProcessFailure};
use crate::key_service::KeyService;
use crate::model::EncryptedRecord;

/// Resolves a record's wrapped data key through the key service
pub struct KeyResolutionStage<K> {
    key_service: K,
}

impl<K: KeyService> KeyResolutionStage<K> {
    pub fn new(key_service: K) -> Self {
        Self { key_service }
    }

    pub fn key_service(&self) -> &K {
        &self.key_service
    }

    pub fn process(&self, record: EncryptedRecord) -> Result<EncryptedRecord, ProcessFailure> {
        if record.has_plaintext_key() {
            return Err(ProcessFailure {
                stage: FailureStage::KeyResolution,
                error: CoreError::ContractViolation(format!(
                    "record {} already carries a plaintext key",
                    record.id
                )),
                record_id: record.id,
            });
        }

        match self.key_service.resolve_key(&record.wrapped_key) {
            Ok(key) => {
                trace!(record_id = %record.id, "data key resolved");
                Ok(record.with_plaintext_key(key))
            }
            Err(source) => Err(ProcessFailure {
                stage: FailureStage::KeyResolution,
                error: CoreError::KeyDecryption {
                    record_id: record.id.clone(),
                    source,
                },
                record_id: record.id,
            }),
        }
    }
}
