// src/export/mod.rs
//! Run-report export
//!
//! JSON only for now: counters, terminal state and the full skip log.

pub use json::{export_report_json, report_to_json, REPORT_FORMAT};

pub mod json;
