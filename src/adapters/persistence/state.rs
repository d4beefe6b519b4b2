//! State Store - Atomic JSON Emission Ledger Persistence
//!
//! Saves the emission ledger to `sent_signals.json` using atomic writes
//! (write to tmp file, then rename), so the file is always either the
//! old or the new version. The format is human-inspectable:
//!
//! ```json
//! { "BTCUSDT": { "date": "2026-04-01", "timestamp": 1775034000 } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::error::ScanError;
use crate::domain::ledger::{EmissionLedger, EmissionRecord};
use crate::ports::repository::LedgerRepository;

/// On-disk form of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedRecord {
    /// UTC calendar date of the last emission.
    date: NaiveDate,
    /// Last emission time (Unix seconds).
    timestamp: i64,
}

type PersistedLedger = BTreeMap<String, PersistedRecord>;

fn to_persisted(ledger: &EmissionLedger) -> PersistedLedger {
    ledger
        .records()
        .map(|r| {
            (
                r.symbol.clone(),
                PersistedRecord {
                    date: r.last_emitted_date,
                    timestamp: r.last_emitted_at.timestamp(),
                },
            )
        })
        .collect()
}

fn from_persisted(persisted: PersistedLedger) -> EmissionLedger {
    EmissionLedger::from_records(persisted.into_iter().map(|(symbol, p)| {
        let at = DateTime::<Utc>::from_timestamp(p.timestamp, 0)
            .unwrap_or_else(|| p.date.and_time(chrono::NaiveTime::MIN).and_utc());
        EmissionRecord {
            symbol,
            last_emitted_date: p.date,
            last_emitted_at: at,
        }
    }))
}

/// Atomic JSON ledger store for crash recovery.
pub struct StateStore {
    /// Path to the state file.
    state_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl StateStore {
    /// Create a new state store in the given data directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: &str, file_name: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            state_path: dir.join(file_name),
            tmp_path: dir.join(format!("{file_name}.tmp")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Move an unreadable state file aside so it can be inspected later.
    async fn quarantine(&self) {
        let corrupt = self.state_path.with_extension("json.corrupt");
        match fs::rename(&self.state_path, &corrupt).await {
            Ok(()) => warn!(path = %corrupt.display(), "Corrupt state file moved aside"),
            Err(e) => warn!(error = %e, "Could not move corrupt state file aside"),
        }
    }
}

#[async_trait]
impl LedgerRepository for StateStore {
    /// Load the ledger; corruption degrades to an empty ledger.
    #[instrument(skip(self))]
    async fn load(&self) -> EmissionLedger {
        let json = match fs::read_to_string(&self.state_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file found, starting fresh");
                return EmissionLedger::new();
            }
            Err(e) => {
                error!(error = %e, "Failed to read state file, starting with empty history");
                return EmissionLedger::new();
            }
        };

        match serde_json::from_str::<PersistedLedger>(&json) {
            Ok(persisted) => {
                let ledger = from_persisted(persisted);
                info!(records = ledger.len(), "Emission state loaded");
                ledger
            }
            Err(e) => {
                error!(error = %e, "Failed to parse state file, starting with empty history");
                self.quarantine().await;
                EmissionLedger::new()
            }
        }
    }

    /// Save the ledger atomically (tmp → fsync → rename).
    #[instrument(skip(self, ledger), fields(records = ledger.len()))]
    async fn save(&self, ledger: &EmissionLedger) -> Result<(), ScanError> {
        let json = serde_json::to_string_pretty(&to_persisted(ledger))
            .map_err(|e| ScanError::Persistence(format!("serialize: {e}")))?;

        let write_err = |e: std::io::Error| {
            ScanError::Persistence(format!("write {}: {e}", self.tmp_path.display()))
        };
        let mut file = fs::File::create(&self.tmp_path).await.map_err(write_err)?;
        file.write_all(json.as_bytes()).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .map_err(|e| ScanError::Persistence(format!("rename {}: {e}", self.state_path.display())))?;

        debug!(path = %self.state_path.display(), "Emission state saved");
        Ok(())
    }
}
