// tests/export_tests.rs
mod support;

use serde_json::Value;
use snapshot_sender::export::{export_report_json, report_to_json, REPORT_FORMAT};
use snapshot_sender::{ChunkRunner, RunReport, RunState, SkipBudget};
use support::{records, Fault, MemorySink, SourceStore};
use tempfile::tempdir;

fn finished_report() -> RunReport {
    let store = SourceStore::new(records(12, &[(2, Fault::UnknownKek), (7, Fault::RevokedKek)]));
    ChunkRunner::builder()
        .source(store.open())
        .key_service(support::vault())
        .sink(MemorySink::new())
        .chunk_size(5)
        .skip_budget(SkipBudget::Limited(10))
        .build()
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn exported_report_carries_counts_and_skip_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports/run.json");
    let report = finished_report();

    export_report_json(&report, &path).unwrap();

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["export_format"], REPORT_FORMAT);
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["report"]["state"], "Done");
    assert_eq!(json["report"]["records_read"], 12);
    assert_eq!(json["report"]["records_written"], 10);
    assert_eq!(json["report"]["chunks_committed"], 3);

    let skips = json["report"]["skips"].as_array().unwrap();
    assert_eq!(skips.len(), 2);
    assert_eq!(skips[0]["record_id"], "rec-02");
    assert_eq!(skips[0]["stage"], "KeyResolution");
    assert_eq!(skips[0]["kind"], "KeyDecryptionFailure");
    assert_eq!(skips[1]["record_id"], "rec-07");
    assert_eq!(skips[1]["chunk_index"], 1);
}

#[test]
fn report_round_trips_through_json() {
    let report = finished_report();
    let json = report_to_json(&report).unwrap();
    let back: RunReport = serde_json::from_value(json["report"].clone()).unwrap();
    assert_eq!(back, report);
    assert_eq!(back.state, RunState::Done);
}

#[test]
fn export_never_contains_payload_bytes() {
    let report = finished_report();
    let text = serde_json::to_string(&report_to_json(&report).unwrap()).unwrap();
    assert!(!text.contains("snapshot payload"));
}
