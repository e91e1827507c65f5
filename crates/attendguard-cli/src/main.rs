// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// attendguard: operator CLI for sealing, verifying and auditing exported
// attendance records.
//
// Records are read from and written to JSON arrays in the external store's
// export format.  Secret storage is the passphrase-protected SQLite store when
// ATTENDGUARD_PASSPHRASE is set, otherwise the stub bridge (session-only key).

mod data_dir;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use attendguard_bridge::stub::StubBridge;
use attendguard_bridge::{PlatformBridge, SecretStorage};
use attendguard_core::SecurityConfig;
use attendguard_core::human_errors::{humanize_error, humanize_outcome};
use attendguard_core::types::{AttendanceRecord, RecordId};
use attendguard_security::{IntegrityStack, KeyDurability, SqliteSecretStorage};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the secret store passphrase.
const PASSPHRASE_ENV: &str = "ATTENDGUARD_PASSPHRASE";

#[derive(Parser)]
#[command(name = "attendguard")]
#[command(author, version, about = "Seal, verify and audit attendance records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory holding config.json and the secret store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print this installation's device identifier
    Identify,

    /// Seal every record in a JSON file
    Seal {
        /// JSON array of records
        input: PathBuf,
        /// Write sealed records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify every record in a JSON file
    Verify {
        /// JSON array of records
        input: PathBuf,
        /// Exit with an error if any record is tampered or foreign
        #[arg(long)]
        strict: bool,
    },

    /// Print a security report for a JSON file of records
    Audit {
        /// JSON array of records
        input: PathBuf,
    },

    /// Decrypt the audit payload of one record
    OpenPayload {
        /// JSON array of records
        input: PathBuf,
        /// Record id
        #[arg(long)]
        id: RecordId,
    },

    /// Write the effective configuration to config.json
    InitConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = data_dir::data_dir(cli.data_dir.as_deref()).context("creating data directory")?;
    let config = SecurityConfig::load(&dir).unwrap_or_default();

    if let Commands::InitConfig = cli.command {
        config.persist(&dir)?;
        println!("{}", dir.join(attendguard_core::config::CONFIG_FILE).display());
        return Ok(());
    }

    let backend = SecretBackend::select(&dir, &config, std::env::var(PASSPHRASE_ENV).ok());
    let stack = IntegrityStack::new(backend.open(&config)?, Arc::new(StubBridge), &config);

    match cli.command {
        Commands::Identify => {
            println!("device:   {}", stack.device.identify());
            println!("secret storage: {}", backend.describe());
            println!("hardware-backed keys: {}", backend.is_hardware_backed());
            println!("device info: {}", StubBridge.platform_name());
            println!("key durability: {:?}", stack.sealer.key_durability()?);
        }
        Commands::Seal { input, output } => {
            let records = read_records(&input)?;
            let sealed = records
                .into_iter()
                .map(|r| stack.sealer.seal_record(r))
                .collect::<attendguard_core::error::Result<Vec<_>>>()?;
            if stack.sealer.key_durability()? == KeyDurability::Ephemeral {
                warn!("sealed with a session-only key; audit payloads will not be readable later");
            }
            info!(count = sealed.len(), "records sealed");
            write_json(output.as_deref(), &sealed)?;
        }
        Commands::Verify { input, strict } => {
            let records = read_records(&input)?;
            let mut findings = 0usize;
            for record in &records {
                let outcome = stack.verifier.verify(record);
                if outcome.is_finding() {
                    findings += 1;
                }
                println!(
                    "{}  {:<14}  {}",
                    record.id,
                    outcome.to_string(),
                    humanize_outcome(outcome).message
                );
            }
            if strict && findings > 0 {
                bail!("{findings} of {} records failed verification", records.len());
            }
        }
        Commands::Audit { input } => {
            let records = read_records(&input)?;
            let report = stack.auditor.audit(&records);
            write_json(None, &report)?;
        }
        Commands::OpenPayload { input, id } => {
            let records = read_records(&input)?;
            let record = records
                .iter()
                .find(|r| r.id == id)
                .with_context(|| format!("record {id} not found in {}", input.display()))?;
            let payload = stack.sealer.open_payload(record).map_err(|e| {
                let human = humanize_error(&e);
                anyhow::Error::new(e).context(format!("{} {}", human.message, human.suggestion))
            })?;
            write_json(None, &payload)?;
        }
        Commands::InitConfig => {}
    }

    Ok(())
}

/// Where the installation's secrets live for this run.
enum SecretBackend {
    /// Passphrase-protected SQLite store in the data directory.
    Sqlite { path: PathBuf, passphrase: String },
    /// The stub bridge; nothing outlives the process.
    Session,
}

impl SecretBackend {
    /// Pick the backend from the passphrase, if one was supplied.
    fn select(dir: &Path, config: &SecurityConfig, passphrase: Option<String>) -> Self {
        match passphrase {
            Some(passphrase) if !passphrase.is_empty() => Self::Sqlite {
                path: dir.join(&config.secret_db_file),
                passphrase,
            },
            _ => Self::Session,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Sqlite { path, .. } => format!("SQLite secret store ({})", path.display()),
            Self::Session => format!("{} (session-only)", StubBridge.platform_name()),
        }
    }

    fn is_hardware_backed(&self) -> bool {
        match self {
            Self::Sqlite { .. } => false,
            Self::Session => StubBridge.is_hardware_backed(),
        }
    }

    fn open(&self, config: &SecurityConfig) -> Result<Arc<dyn SecretStorage>> {
        match self {
            Self::Sqlite { path, passphrase } => {
                let store = SqliteSecretStorage::open(path, passphrase, config.kdf_iterations)
                    .with_context(|| format!("opening secret store {}", path.display()))?;
                Ok(Arc::new(store))
            }
            Self::Session => {
                warn!("{PASSPHRASE_ENV} not set; using session-only secret storage");
                Ok(Arc::new(StubBridge))
            }
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<AttendanceRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn open_payload_parses_record_id() {
        let id = RecordId::new();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "attendguard",
            "open-payload",
            "records.json",
            "--id",
            id_arg.as_str(),
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::OpenPayload { id: parsed, .. } if parsed == id));
    }

    #[test]
    fn passphrase_selects_sqlite_store() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SecurityConfig::default();

        let backend = SecretBackend::select(tmp.path(), &config, Some("hunter2".into()));
        let expected = tmp.path().join(&config.secret_db_file);
        assert!(matches!(&backend, SecretBackend::Sqlite { path, .. } if *path == expected));
        assert!(backend.describe().starts_with("SQLite secret store"));
        assert!(!backend.describe().contains("hunter2"));
        assert!(!backend.is_hardware_backed());

        let storage = backend.open(&SecurityConfig {
            kdf_iterations: 1_000,
            ..config.clone()
        });
        storage.unwrap().store("k", b"v").unwrap();
        assert!(expected.exists());
    }

    #[test]
    fn missing_or_empty_passphrase_is_session_only() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SecurityConfig::default();
        for passphrase in [None, Some(String::new())] {
            let backend = SecretBackend::select(tmp.path(), &config, passphrase);
            assert!(matches!(backend, SecretBackend::Session));
            assert!(backend.describe().contains("session-only"));
        }
    }

    #[test]
    fn sealed_file_verifies_after_reading_back() {
        use attendguard_bridge::memory::{FixedDeviceInfo, MemorySecretStorage};
        use attendguard_core::types::{Location, VerificationOutcome};

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sealed.json");
        let stack = IntegrityStack::new(
            Arc::new(MemorySecretStorage::new()),
            Arc::new(FixedDeviceInfo::new("Pixel 8", Some("SN-001"))),
            &SecurityConfig::default(),
        );

        let records: Vec<AttendanceRecord> = [-111.97804110201159, 1.07e-75, 48.137154]
            .into_iter()
            .map(|lat| {
                let mut r = AttendanceRecord::new(
                    "u1",
                    chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                );
                r.check_in_location = Some(Location::new(lat, 11.576124, "Site"));
                stack.sealer.seal_record(r).unwrap()
            })
            .collect();
        write_json(Some(&path), &records).unwrap();

        for record in read_records(&path).unwrap() {
            assert_eq!(stack.verifier.verify(&record), VerificationOutcome::Valid);
        }
    }

    #[test]
    fn records_file_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.json");
        let records = vec![AttendanceRecord::new(
            "u1",
            chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        )];
        write_json(Some(&path), &records).unwrap();
        assert_eq!(read_records(&path).unwrap(), records);
    }
}
