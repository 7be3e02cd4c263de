// src/stages/composite.rs
use crate::error::ProcessFailure;
use crate::key_service::KeyService;
use crate::model::{DecryptedRecord, EncryptedRecord};

use super::{DecryptionStage, KeyResolutionStage};

/// Key resolution followed by decryption, short-circuiting on the first failure
pub struct CompositeProcessor<K> {
    key_resolution: KeyResolutionStage<K>,
    decryption: DecryptionStage,
}

impl<K: KeyService> CompositeProcessor<K> {
    pub fn new(key_service: K) -> Self {
        Self {
            key_resolution: KeyResolutionStage::new(key_service),
            decryption: DecryptionStage::new(),
        }
    }

    pub fn key_service(&self) -> &K {
        self.key_resolution.key_service()
    }

    pub fn process(&self, record: EncryptedRecord) -> Result<DecryptedRecord, ProcessFailure> {
        let keyed = self.key_resolution.process(record)?;
        self.decryption.process(keyed)
    }
}
