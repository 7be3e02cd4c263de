// src/bin/snapshot_sender.rs
//! snapshot-sender: decrypt encrypted snapshot records in chunks
//!
//! Exit status: 0 done, 1 aborted, 2 stopped.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use snapshot_sender::config::{self, Config};
use snapshot_sender::db::source_db_conn::open_source_db;
use snapshot_sender::db::source_db_ops::{count_records, read_checkpoint};
use snapshot_sender::db::vault_db_conn::open_vault_db;
use snapshot_sender::db::vault_db_ops::{revoke_key_encryption_key, store_key_encryption_key};
use snapshot_sender::key_ops::{
    generate_key_encryption_key, key_representations, parse_key_encryption_key,
};
use snapshot_sender::{
    export_report_json, ChunkRunner, DirectorySink, RunState, SqliteRecordSource, VaultKeyService,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "snapshot_sender",
    version,
    about = "Decrypt encrypted snapshot records in committed chunks"
)]
struct Cli {
    /// Defaults to `run` when omitted
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: platform config dir, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the run report as JSON to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Decrypt pending records, resuming after the last committed chunk
    Run,
    /// Show the record count and the committed cursor
    Status,
    /// Generate a key-encryption key, store it, and print it once
    NewKek {
        /// Identifier wrapped data keys refer to
        key_id: String,
    },
    /// Store an existing key-encryption key given as hex or base64
    ImportKek {
        key_id: String,
        /// 64 hex chars or standard base64
        key: String,
    },
    /// Revoke a key-encryption key; records wrapped under it are skipped
    RevokeKek { key_id: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut conf = config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            conf.apply_env_overrides();
            conf.validate()?;
            Ok(conf)
        }
        None => Ok(config::load().context("Failed to resolve configuration")?.clone()),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let conf = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_job(&conf, cli.report.as_ref()),
        Commands::Status => status(&conf).map(|_| ExitCode::SUCCESS),
        Commands::NewKek { key_id } => new_kek(&conf, &key_id).map(|_| ExitCode::SUCCESS),
        Commands::ImportKek { key_id, key } => {
            import_kek(&conf, &key_id, &key).map(|_| ExitCode::SUCCESS)
        }
        Commands::RevokeKek { key_id } => revoke_kek(&conf, &key_id).map(|_| ExitCode::SUCCESS),
    }
}

fn run_job(conf: &Config, report_path: Option<&PathBuf>) -> Result<ExitCode> {
    info!(job = %conf.job.name, step = %conf.job.step, "snapshot-sender starting");

    let source_conn = open_source_db(&conf.paths.source_db, conf.keys.source_passphrase().as_ref())
        .with_context(|| {
            format!(
                "Failed to open source database {} (is SNAPSHOT_SENDER_SOURCE_KEY set?)",
                conf.paths.source_db.display()
            )
        })?;
    let source = SqliteRecordSource::new(source_conn, &conf.job.name, &conf.job.step)
        .context("Failed to read job checkpoint")?;

    let vault_conn = open_vault_db(&conf.paths.vault_db, conf.keys.vault_passphrase().as_ref())
        .with_context(|| {
            format!(
                "Failed to open key vault {} (is SNAPSHOT_SENDER_VAULT_KEY set?)",
                conf.paths.vault_db.display()
            )
        })?;
    let key_service =
        VaultKeyService::from_vault_db(&vault_conn).context("Failed to load key vault")?;
    if key_service.is_empty() {
        warn!("key vault is empty; every record will fail key resolution");
    }

    let sink = DirectorySink::new(&conf.paths.output_dir).with_context(|| {
        format!(
            "Failed to prepare output directory {}",
            conf.paths.output_dir.display()
        )
    })?;

    let mut runner = ChunkRunner::builder()
        .source(source)
        .key_service(key_service)
        .sink(sink)
        .chunk_size(conf.job.chunk_size)
        .skip_budget(conf.job.skip_budget)
        .job_name(&conf.job.name)
        .step_name(&conf.job.step)
        .build()?;

    let report = match runner.run() {
        Ok(report) => report,
        Err(aborted) => {
            error!(kind = %aborted.kind(), "{aborted}");
            aborted.report
        }
    };

    if let Some(path) = report_path {
        export_report_json(&report, path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    println!(
        "{:?}: read {} | written {} | skipped {} | chunks {}",
        report.state,
        report.records_read,
        report.records_written,
        report.records_skipped,
        report.chunks_committed
    );
    if report.state == RunState::Aborted {
        eprintln!("Job aborted; a rerun resumes after the last committed chunk");
    }

    Ok(ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)))
}

fn status(conf: &Config) -> Result<()> {
    let conn = open_source_db(&conf.paths.source_db, conf.keys.source_passphrase().as_ref())
        .context("Failed to open source database")?;
    let total = count_records(&conn)?;
    let position = read_checkpoint(&conn, &conf.job.name, &conf.job.step)?.unwrap_or(0);
    println!(
        "{} / {}: {} record(s) in source, cursor at {}",
        conf.job.name, conf.job.step, total, position
    );
    Ok(())
}

fn new_kek(conf: &Config, key_id: &str) -> Result<()> {
    let conn = open_vault_db(&conf.paths.vault_db, conf.keys.vault_passphrase().as_ref())
        .context("Failed to open key vault")?;
    let key = generate_key_encryption_key();
    store_key_encryption_key(&conn, key_id, &key)?;

    let repr = key_representations(&key);
    info!(key_id, "key-encryption key generated");
    println!("{key_id}: {}", repr.hex);
    println!("SECURITY: this is the only time the key is printed. Store it offline.");
    Ok(())
}

fn import_kek(conf: &Config, key_id: &str, key_text: &str) -> Result<()> {
    let key = parse_key_encryption_key(key_text).context("Invalid key-encryption key")?;
    let conn = open_vault_db(&conf.paths.vault_db, conf.keys.vault_passphrase().as_ref())
        .context("Failed to open key vault")?;
    store_key_encryption_key(&conn, key_id, &key)?;
    info!(key_id, "key-encryption key imported");
    Ok(())
}

fn revoke_kek(conf: &Config, key_id: &str) -> Result<()> {
    let conn = open_vault_db(&conf.paths.vault_db, conf.keys.vault_passphrase().as_ref())
        .context("Failed to open key vault")?;
    if !revoke_key_encryption_key(&conn, key_id)? {
        bail!("no active key-encryption key named {key_id}");
    }
    info!(key_id, "key-encryption key revoked");
    Ok(())
}
