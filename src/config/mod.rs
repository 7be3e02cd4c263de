// src/config/mod.rs
//! Job configuration: TOML file plus `SNAPSHOT_SENDER_*` environment overrides
//!
//! Search order: `$SNAPSHOT_SENDER_CONFIG`, `./snapshot-sender.toml`,
//! `<config dir>/snapshot-sender/config.toml`, then built-in defaults.

pub use app::{config_path, load, load_from, resolve, Config, JobConfig, Keys, Paths};
pub use defaults::{
    CONFIG_ENV, OUTPUT_DIR_ENV, SOURCE_DB_ENV, SOURCE_KEY_ENV, VAULT_DB_ENV, VAULT_KEY_ENV,
};

mod app;
mod defaults;
