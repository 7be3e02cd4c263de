// tests/runner_tests.rs
//! Chunk runner behaviour against an in-memory source and sink

mod common;
mod support;

use snapshot_sender::{
    ChunkRunner, CoreError, ErrorKind, FailureStage, RunState, SkipBudget, StopHandle,
    VaultKeyService,
};
use support::{plaintext_for, record_id, records, Fault, MemorySink, SourceStore, VecSource};

type TestRunner = ChunkRunner<VecSource, VaultKeyService, MemorySink>;

fn runner(store: &SourceStore, sink: MemorySink, chunk_size: usize, budget: SkipBudget) -> TestRunner {
    ChunkRunner::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(sink)
        .chunk_size(chunk_size)
        .skip_budget(budget)
        .build()
        .expect("build runner")
}

#[test]
fn twenty_five_records_with_one_bad_key_commit_three_chunks() {
    common::setup();
    let store = SourceStore::new(records(25, &[(6, Fault::UnknownKek)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);

    let report = runner.run().expect("job should finish");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(store.commit_history(), vec![10, 20, 25]);
    assert_eq!(report.chunks_committed, 3);
    assert_eq!(report.records_read, 25);
    assert_eq!(report.records_written, 24);
    assert_eq!(report.records_skipped, 1);

    let sink = runner.sink();
    assert_eq!(sink.batch_sizes(), vec![9, 10, 5]);
    assert!(!sink.written_ids().contains(&record_id(6)));

    let skip = &report.skips[0];
    assert_eq!(skip.record_id, record_id(6));
    assert_eq!(skip.stage, FailureStage::KeyResolution);
    assert_eq!(skip.kind, ErrorKind::KeyDecryptionFailure);
    assert_eq!(skip.chunk_index, 0);
}

#[test]
fn decrypted_payloads_reach_the_sink_in_source_order() {
    let store = SourceStore::new(records(4, &[]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    runner.run().expect("job should finish");

    let payloads = &runner.sink().payloads;
    assert_eq!(payloads.len(), 4);
    for (i, (id, payload)) in payloads.iter().enumerate() {
        assert_eq!(id, &record_id(i));
        assert_eq!(payload, &plaintext_for(i));
    }
}

#[test]
fn payload_failure_aborts_with_nothing_written_or_committed() {
    let store = SourceStore::new(records(5, &[(2, Fault::CorruptPayload)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);

    let aborted = runner.run().expect_err("corrupt payload is fatal");

    assert_eq!(aborted.kind(), ErrorKind::PayloadDecryptionFailure);
    assert!(matches!(
        aborted.error,
        CoreError::PayloadDecryption { ref record_id, .. } if record_id == "rec-02"
    ));
    assert_eq!(aborted.report.state, RunState::Aborted);
    assert_eq!(aborted.report.exit_code(), 1);
    assert_eq!(aborted.report.chunks_committed, 0);
    assert!(aborted.report.skips.is_empty());
    assert_eq!(runner.sink().calls, 0);
    assert!(store.commit_history().is_empty());
    assert_eq!(store.committed(), 0);
}

#[test]
fn unsupported_algorithm_is_a_payload_failure() {
    let store = SourceStore::new(records(3, &[(1, Fault::UnsupportedAlgorithm)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);

    let aborted = runner.run().expect_err("unsupported algorithm is fatal");
    assert_eq!(aborted.kind(), ErrorKind::PayloadDecryptionFailure);
}

#[test]
fn revoked_key_is_skipped_like_any_key_failure() {
    let store = SourceStore::new(records(3, &[(0, Fault::RevokedKek)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Limited(1));

    let report = runner.run().expect("one skip fits the budget");
    assert_eq!(report.records_skipped, 1);
    assert!(report.skips[0].message.contains("not authorized"));
    assert_eq!(runner.sink().written_ids(), vec![record_id(1), record_id(2)]);
}

#[test]
fn budget_of_k_aborts_on_the_k_plus_first_skippable_failure() {
    let faults = [
        (1, Fault::UnknownKek),
        (4, Fault::UnknownKek),
        (12, Fault::UnknownKek),
    ];
    let store = SourceStore::new(records(20, &faults));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Limited(2));

    let aborted = runner.run().expect_err("third skip exceeds budget");

    assert_eq!(aborted.kind(), ErrorKind::KeyDecryptionFailure);
    assert!(matches!(
        aborted.error,
        CoreError::KeyDecryption { ref record_id, .. } if record_id == "rec-12"
    ));
    assert_eq!(aborted.report.records_skipped, 2);
    assert_eq!(aborted.report.chunks_committed, 1);
    assert_eq!(store.committed(), 10);
    assert_eq!(runner.sink().batch_sizes(), vec![8]);
}

#[test]
fn zero_budget_aborts_on_the_first_skippable_failure() {
    let store = SourceStore::new(records(3, &[(0, Fault::UnknownKek)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Limited(0));

    let aborted = runner.run().expect_err("no budget");
    assert_eq!(aborted.kind(), ErrorKind::KeyDecryptionFailure);
    assert!(aborted.report.skips.is_empty());
}

#[test]
fn commit_cycles_are_ceil_n_over_c() {
    for (n, c) in [(0, 3), (1, 3), (3, 3), (7, 3), (10, 10), (25, 10), (9, 1), (11, 4)] {
        let store = SourceStore::new(records(n, &[]));
        let mut runner = runner(&store, MemorySink::new(), c, SkipBudget::Unbounded);
        let report = runner.run().expect("clean run");

        let expected_chunks = n.div_ceil(c);
        assert_eq!(report.chunks_committed as usize, expected_chunks, "n={n} c={c}");
        assert_eq!(store.commit_history().len(), expected_chunks, "n={n} c={c}");

        let sizes = runner.sink().batch_sizes();
        if n > 0 {
            let last = if n % c == 0 { c } else { n % c };
            assert_eq!(sizes.last().copied(), Some(last), "n={n} c={c}");
            assert!(sizes[..sizes.len() - 1].iter().all(|&s| s == c));
            assert_eq!(store.committed(), n as u64);
        } else {
            assert!(sizes.is_empty());
        }
    }
}

#[test]
fn restart_resumes_after_the_last_committed_chunk() {
    let store = SourceStore::new(records(30, &[(23, Fault::CorruptPayload)]));

    let mut first = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    let aborted = first.run().expect_err("chunk 3 is corrupt");
    assert_eq!(aborted.report.chunks_committed, 2);
    assert_eq!(store.committed(), 20);
    assert_eq!(first.sink().written_ids().len(), 20);

    // Operator repairs the record and reruns.
    store.replace(23, support::good(23));
    let mut second = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    let report = second.run().expect("second run completes");

    let reads = &second.source().reads;
    assert_eq!(reads.len(), 10);
    assert_eq!(reads.first(), Some(&record_id(20)));
    assert!(!reads.iter().any(|id| first.sink().written_ids().contains(id)));
    assert_eq!(report.records_written, 10);
    assert_eq!(report.last_committed_position, 30);
    assert_eq!(store.commit_history(), vec![10, 20, 30]);
}

#[test]
fn rejected_batch_is_skipped_as_a_whole_for_one_budget_unit() {
    let store = SourceStore::new(records(25, &[]));
    let mut runner = runner(&store, MemorySink::failing_on(&[1]), 10, SkipBudget::Limited(1));

    let report = runner.run().expect("one rejected batch fits the budget");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.chunks_committed, 3);
    assert_eq!(report.records_written, 15);
    assert_eq!(report.records_skipped, 10);
    assert!(report.skips.iter().all(|s| s.stage == FailureStage::Write
        && s.kind == ErrorKind::SinkWriteFailure
        && s.chunk_index == 1));
    let skipped: Vec<_> = report.skips.iter().map(|s| s.record_id.clone()).collect();
    assert_eq!(skipped, (10..20).map(record_id).collect::<Vec<_>>());
    assert_eq!(store.commit_history(), vec![10, 20, 25]);
}

#[test]
fn rejected_batch_over_budget_aborts_before_commit() {
    let store = SourceStore::new(records(25, &[]));
    let mut runner = runner(&store, MemorySink::failing_on(&[1]), 10, SkipBudget::Limited(0));

    let aborted = runner.run().expect_err("no budget for the rejected batch");

    assert_eq!(aborted.kind(), ErrorKind::SinkWriteFailure);
    assert!(matches!(aborted.error, CoreError::SinkWrite { batch_len: 10, .. }));
    assert_eq!(store.commit_history(), vec![10]);
    assert_eq!(aborted.report.records_written, 10);
}

#[test]
fn chunk_without_survivors_commits_without_calling_the_sink() {
    let faults = [(0, Fault::UnknownKek), (1, Fault::UnknownKek)];
    let store = SourceStore::new(records(2, &faults));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);

    let report = runner.run().expect("all skipped is still done");

    assert_eq!(runner.sink().calls, 0);
    assert_eq!(report.records_skipped, 2);
    assert_eq!(store.commit_history(), vec![2]);
}

#[test]
fn contract_violation_never_consults_the_budget() {
    let store = SourceStore::new(records(3, &[(1, Fault::AlreadyKeyed)]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);

    let aborted = runner.run().expect_err("contract violation is fatal");

    assert_eq!(aborted.kind(), ErrorKind::ContractViolation);
    assert!(aborted.report.skips.is_empty());
    assert_eq!(runner.sink().calls, 0);
    assert_eq!(store.committed(), 0);
}

#[test]
fn stop_before_start_commits_nothing() {
    let store = SourceStore::new(records(5, &[]));
    let stop = StopHandle::new();
    stop.stop();

    let mut runner = ChunkRunner::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::new())
        .stop_handle(stop)
        .build()
        .expect("build runner");
    let report = runner.run().expect("stopped is not an error");

    assert_eq!(report.state, RunState::Stopped);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.records_read, 0);
    assert!(store.commit_history().is_empty());
}

#[test]
fn stop_is_honoured_at_the_next_chunk_boundary() {
    let store = SourceStore::new(records(25, &[]));
    let stop = StopHandle::new();

    let mut runner = ChunkRunner::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::stopping_after(1, stop.clone()))
        .chunk_size(10)
        .stop_handle(stop)
        .build()
        .expect("build runner");
    let report = runner.run().expect("stopped is not an error");

    assert_eq!(report.state, RunState::Stopped);
    assert_eq!(report.chunks_committed, 1);
    assert_eq!(report.records_read, 10);
    assert_eq!(store.commit_history(), vec![10]);
}

#[test]
fn runner_cannot_be_run_twice() {
    let store = SourceStore::new(records(2, &[]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    runner.run().expect("first run");

    let aborted = runner.run().expect_err("second run is refused");
    assert_eq!(aborted.kind(), ErrorKind::ContractViolation);
    assert_eq!(store.commit_history(), vec![2]);
}

#[test]
fn builder_rejects_zero_chunk_size_and_missing_parts() {
    let store = SourceStore::new(Vec::new());

    let zero = ChunkRunner::<VecSource, VaultKeyService, MemorySink>::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::new())
        .chunk_size(0)
        .build();
    assert!(matches!(zero, Err(CoreError::Config(_))));

    let no_sink = ChunkRunner::<VecSource, VaultKeyService, MemorySink>::builder()
        .source(store.open())
        .key_service(support::vault())
        .build();
    assert!(matches!(no_sink, Err(CoreError::Config(_))));

    let blank_job = ChunkRunner::<VecSource, VaultKeyService, MemorySink>::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::new())
        .job_name("  ")
        .build();
    assert!(matches!(blank_job, Err(CoreError::Config(_))));
}

#[test]
fn builder_defaults_match_the_job_defaults() {
    let store = SourceStore::new(Vec::new());
    let runner: TestRunner = ChunkRunner::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::new())
        .build()
        .expect("build runner");

    assert_eq!(runner.chunk_size(), 10);
    assert_eq!(runner.state(), RunState::Idle);
    assert_eq!(runner.report().job_name, "snapshotSenderJob");
    assert_eq!(runner.report().step_name, "step");
}

#[test]
fn partial_last_chunk_passes_through_draining_after_its_commit() {
    let store = SourceStore::new(records(15, &[]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    runner.run().expect("clean run");

    let history = runner.state_history();
    assert_eq!(history.first(), Some(&RunState::Idle));
    assert_eq!(
        &history[history.len() - 3..],
        &[RunState::Committing, RunState::Draining, RunState::Done]
    );
    assert_eq!(history.iter().filter(|s| **s == RunState::Draining).count(), 1);
    assert_eq!(history.iter().filter(|s| **s == RunState::Committing).count(), 2);
}

#[test]
fn exact_multiple_of_chunk_size_never_drains() {
    let store = SourceStore::new(records(20, &[]));
    let mut runner = runner(&store, MemorySink::new(), 10, SkipBudget::Unbounded);
    runner.run().expect("clean run");

    let history = runner.state_history();
    assert!(!history.contains(&RunState::Draining));
    assert_eq!(
        &history[history.len() - 2..],
        &[RunState::Filling, RunState::Done]
    );
}

#[test]
fn huge_chunk_size_does_not_reserve_memory_up_front() {
    let store = SourceStore::new(records(3, &[]));
    let mut runner = runner(&store, MemorySink::new(), 1_000_000_000_000, SkipBudget::Unbounded);

    let report = runner.run().expect("clean run");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.chunks_committed, 1);
    assert_eq!(store.commit_history(), vec![3]);
    assert_eq!(runner.sink().batch_sizes(), vec![3]);
}
