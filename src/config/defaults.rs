// src/config/defaults.rs
use std::path::PathBuf;

use crate::config::app::{JobConfig, Keys, Paths};
use crate::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_JOB_NAME, DEFAULT_STEP_NAME};
use crate::skip::SkipBudget;

pub const CONFIG_ENV: &str = "SNAPSHOT_SENDER_CONFIG";
pub const SOURCE_DB_ENV: &str = "SNAPSHOT_SENDER_SOURCE_DB";
pub const VAULT_DB_ENV: &str = "SNAPSHOT_SENDER_VAULT_DB";
pub const OUTPUT_DIR_ENV: &str = "SNAPSHOT_SENDER_OUTPUT_DIR";
pub const SOURCE_KEY_ENV: &str = "SNAPSHOT_SENDER_SOURCE_KEY";
pub const VAULT_KEY_ENV: &str = "SNAPSHOT_SENDER_VAULT_KEY";

/// Looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "snapshot-sender.toml";

/// Looked up under the platform config directory
pub const USER_CONFIG_DIR: &str = "snapshot-sender";
pub const USER_CONFIG_FILE: &str = "config.toml";

pub fn default_job() -> JobConfig {
    JobConfig {
        name: DEFAULT_JOB_NAME.into(),
        step: DEFAULT_STEP_NAME.into(),
        chunk_size: DEFAULT_CHUNK_SIZE,
        skip_budget: SkipBudget::Unbounded,
    }
}

pub fn default_paths() -> Paths {
    Paths {
        source_db: PathBuf::from("data/source.db"),
        vault_db: PathBuf::from("data/vault.db"),
        output_dir: PathBuf::from("output"),
    }
}

pub fn default_keys() -> Keys {
    Keys {
        source_key: None,
        vault_key: None,
    }
}
