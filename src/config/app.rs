// src/config/app.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::defaults::*;
use crate::aliases::VaultPassphrase;
use crate::error::{CoreError, Result};
use crate::skip::SkipBudget;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub job: JobConfig,
    pub paths: Paths,
    pub keys: Keys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub name: String,
    pub step: String,
    pub chunk_size: usize,
    pub skip_budget: SkipBudget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub source_db: PathBuf,
    pub vault_db: PathBuf,
    pub output_dir: PathBuf,
}

/// SQLCipher passphrases; `None` opens the database unencrypted
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Keys {
    pub source_key: Option<String>,
    pub vault_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job: default_job(),
            paths: default_paths(),
            keys: default_keys(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        default_job()
    }
}

impl Default for Paths {
    fn default() -> Self {
        default_paths()
    }
}

impl Default for Keys {
    fn default() -> Self {
        default_keys()
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("Keys")
            .field("source_key", &redact(&self.source_key))
            .field("vault_key", &redact(&self.vault_key))
            .finish()
    }
}

impl Keys {
    pub fn source_passphrase(&self) -> Option<VaultPassphrase> {
        self.source_key.clone().map(VaultPassphrase::new)
    }

    pub fn vault_passphrase(&self) -> Option<VaultPassphrase> {
        self.vault_key.clone().map(VaultPassphrase::new)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let conf: Config = toml::from_str(content)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Overlay `SNAPSHOT_SENDER_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Overlay values from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(SOURCE_DB_ENV) {
            self.paths.source_db = PathBuf::from(v);
        }
        if let Some(v) = get(VAULT_DB_ENV) {
            self.paths.vault_db = PathBuf::from(v);
        }
        if let Some(v) = get(OUTPUT_DIR_ENV) {
            self.paths.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get(SOURCE_KEY_ENV) {
            self.keys.source_key = Some(v);
        }
        if let Some(v) = get(VAULT_KEY_ENV) {
            self.keys.vault_key = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.job.chunk_size == 0 {
            return Err(CoreError::Config("job.chunk_size must be at least 1".into()));
        }
        if self.job.name.trim().is_empty() {
            return Err(CoreError::Config("job.name must not be empty".into()));
        }
        if self.job.step.trim().is_empty() {
            return Err(CoreError::Config("job.step must not be empty".into()));
        }
        Ok(())
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Process-wide config, resolved on first call
pub fn load() -> Result<&'static Config> {
    if let Some(conf) = CONFIG.get() {
        return Ok(conf);
    }
    let conf = resolve()?;
    Ok(CONFIG.get_or_init(|| conf))
}

/// Parse and validate one config file, without environment overrides
pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
    let conf = Config::from_toml_str(&content)?;
    debug!(path = %path.display(), "config loaded");
    Ok(conf)
}

/// File (if any) + environment overrides, validated; never cached
pub fn resolve() -> Result<Config> {
    let mut conf = match config_path()? {
        Some(path) => load_from(path)?,
        None => {
            warn!("no config file found, using built-in defaults");
            Config::default()
        }
    };
    conf.apply_env_overrides();
    conf.validate()?;
    Ok(conf)
}

/// An explicit `SNAPSHOT_SENDER_CONFIG` must exist; the fallbacks are optional
pub fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(explicit);
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "{CONFIG_ENV} points to missing file {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
        .filter(|path| path.exists()))
}
