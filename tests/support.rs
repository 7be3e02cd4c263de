// tests/support.rs
//! Test fixtures: real AES-GCM records, an in-memory source with a durable
//! cursor, and a recording sink that can be told to fail

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use snapshot_sender::crypto::{encrypt_payload, wrap_data_key};
use snapshot_sender::error::{Result, SinkError};
use snapshot_sender::{
    DataKey32, DecryptedRecord, EncryptedRecord, KeyEncryptionKey32, RecordSink, RecordSource,
    StopHandle, VaultKeyService, WrappedKey,
};

pub const KEK_ID: &str = "kek-2025";
pub const KEK_BYTES: [u8; 32] = [0x42; 32];
pub const REVOKED_KEK_ID: &str = "kek-2019";
pub const REVOKED_KEK_BYTES: [u8; 32] = [0x19; 32];

pub fn record_id(i: usize) -> String {
    format!("rec-{i:02}")
}

pub fn plaintext_for(i: usize) -> Vec<u8> {
    format!("snapshot payload #{i}").into_bytes()
}

/// Deterministic per-record data key
pub fn data_key_for(i: usize) -> DataKey32 {
    let mut bytes = [0u8; 32];
    bytes[0] = i as u8;
    bytes[31] = 0xA5;
    DataKey32::new(bytes)
}

/// Vault holding the active KEK plus one revoked KEK
pub fn vault() -> VaultKeyService {
    let mut vault = VaultKeyService::new()
        .with_key(KEK_ID, KeyEncryptionKey32::new(KEK_BYTES))
        .with_key(REVOKED_KEK_ID, KeyEncryptionKey32::new(REVOKED_KEK_BYTES));
    vault.revoke(REVOKED_KEK_ID);
    vault
}

/// Everything needed to rebuild an [`EncryptedRecord`]
#[derive(Debug, Clone)]
pub struct RecordSpec {
    pub id: String,
    pub position: u64,
    pub algorithm: String,
    pub nonce: Vec<u8>,
    pub payload: Vec<u8>,
    pub wrapped_key: WrappedKey,
    /// Hand the record out already key-annotated (an out-of-order stage call)
    pub preloaded_key: Option<[u8; 32]>,
}

impl RecordSpec {
    pub fn to_record(&self) -> EncryptedRecord {
        let record = EncryptedRecord::new(
            self.id.clone(),
            self.position,
            self.algorithm.clone(),
            self.nonce.clone(),
            self.payload.clone(),
            self.wrapped_key.clone(),
        );
        match self.preloaded_key {
            Some(bytes) => record.with_plaintext_key(DataKey32::new(bytes)),
            None => record,
        }
    }
}

fn sealed_under(i: usize, kek_id: &str, kek_bytes: [u8; 32]) -> RecordSpec {
    let id = record_id(i);
    let data_key = data_key_for(i);
    let wrapped = wrap_data_key(&KeyEncryptionKey32::new(kek_bytes), kek_id, &data_key)
        .expect("wrap data key");
    let sealed = encrypt_payload(&data_key, &id, &plaintext_for(i)).expect("encrypt payload");

    RecordSpec {
        id,
        position: i as u64,
        algorithm: "AES-256-GCM".into(),
        nonce: sealed.nonce.to_vec(),
        payload: sealed.ciphertext,
        wrapped_key: WrappedKey::new(kek_id, wrapped),
        preloaded_key: None,
    }
}

/// Decrypts cleanly with [`vault`]
pub fn good(i: usize) -> RecordSpec {
    sealed_under(i, KEK_ID, KEK_BYTES)
}

/// Wrapped under a KEK the vault has never heard of: key resolution fails
pub fn unknown_kek(i: usize) -> RecordSpec {
    sealed_under(i, "kek-unknown", [0x01; 32])
}

/// Wrapped under the revoked KEK: key resolution fails as unauthorized
pub fn revoked_kek(i: usize) -> RecordSpec {
    sealed_under(i, REVOKED_KEK_ID, REVOKED_KEK_BYTES)
}

/// Key resolves, but the payload tag does not verify
pub fn corrupt_payload(i: usize) -> RecordSpec {
    let mut spec = good(i);
    spec.payload[0] ^= 0xFF;
    spec
}

pub fn unsupported_algorithm(i: usize) -> RecordSpec {
    let mut spec = good(i);
    spec.algorithm = "ChaCha20-Poly1305".into();
    spec
}

pub fn already_keyed(i: usize) -> RecordSpec {
    let mut spec = good(i);
    spec.preloaded_key = Some([0x11; 32]);
    spec
}

/// Ways a fixture record can be broken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    UnknownKek,
    RevokedKek,
    CorruptPayload,
    UnsupportedAlgorithm,
    AlreadyKeyed,
}

pub fn faulty(i: usize, fault: Fault) -> RecordSpec {
    match fault {
        Fault::UnknownKek => unknown_kek(i),
        Fault::RevokedKek => revoked_kek(i),
        Fault::CorruptPayload => corrupt_payload(i),
        Fault::UnsupportedAlgorithm => unsupported_algorithm(i),
        Fault::AlreadyKeyed => already_keyed(i),
    }
}

/// `n` records at positions `0..n`, good except where `faults` says otherwise
pub fn records(n: usize, faults: &[(usize, Fault)]) -> Vec<RecordSpec> {
    (0..n)
        .map(|i| match faults.iter().find(|(at, _)| *at == i) {
            Some((_, fault)) => faulty(i, *fault),
            None => good(i),
        })
        .collect()
}

/// Durable side of [`VecSource`]: records plus the committed cursor
///
/// Cloning shares state, so a "restarted" source sees earlier commits.
#[derive(Clone, Default)]
pub struct SourceStore {
    pub records: Rc<RefCell<Vec<RecordSpec>>>,
    pub cursor: Rc<Cell<u64>>,
    pub commits: Rc<RefCell<Vec<u64>>>,
}

impl SourceStore {
    pub fn new(records: Vec<RecordSpec>) -> Self {
        Self {
            records: Rc::new(RefCell::new(records)),
            ..Self::default()
        }
    }

    pub fn open(&self) -> VecSource {
        VecSource {
            store: self.clone(),
            read_from: self.cursor.get(),
            reads: Vec::new(),
        }
    }

    pub fn replace(&self, at: usize, spec: RecordSpec) {
        self.records.borrow_mut()[at] = spec;
    }

    pub fn committed(&self) -> u64 {
        self.cursor.get()
    }

    pub fn commit_history(&self) -> Vec<u64> {
        self.commits.borrow().clone()
    }
}

pub struct VecSource {
    store: SourceStore,
    read_from: u64,
    /// Ids handed out by this instance, in order
    pub reads: Vec<String>,
}

impl RecordSource for VecSource {
    fn next(&mut self) -> Result<Option<EncryptedRecord>> {
        let records = self.store.records.borrow();
        let Some(spec) = records.get(self.read_from as usize) else {
            return Ok(None);
        };
        self.read_from += 1;
        self.reads.push(spec.id.clone());
        Ok(Some(spec.to_record()))
    }

    fn commit(&mut self, position: u64) -> Result<()> {
        assert!(position >= self.store.cursor.get(), "cursor moved backwards");
        self.store.cursor.set(position);
        self.store.commits.borrow_mut().push(position);
        Ok(())
    }

    fn committed_position(&self) -> u64 {
        self.store.cursor.get()
    }
}

/// Records every delivered batch; fails the batch calls listed in `fail_calls`
#[derive(Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<String>>,
    pub payloads: Vec<(String, Vec<u8>)>,
    pub calls: usize,
    pub fail_calls: HashSet<usize>,
    /// Request a stop once this many batches were delivered
    pub stop_after: Option<(usize, StopHandle)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_calls: calls.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn stopping_after(batches: usize, stop: StopHandle) -> Self {
        Self {
            stop_after: Some((batches, stop)),
            ..Self::default()
        }
    }

    pub fn written_ids(&self) -> Vec<String> {
        self.batches.iter().flatten().cloned().collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }
}

impl RecordSink for MemorySink {
    fn write_batch(&mut self, batch: &[DecryptedRecord]) -> std::result::Result<(), SinkError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_calls.contains(&call) {
            return Err(SinkError::Rejected(format!("batch call {call} refused")));
        }

        self.batches
            .push(batch.iter().map(|r| r.id.clone()).collect());
        self.payloads
            .extend(batch.iter().map(|r| (r.id.clone(), r.payload().to_vec())));

        if let Some((after, stop)) = &self.stop_after {
            if self.batches.len() >= *after {
                stop.stop();
            }
        }
        Ok(())
    }
}
