//! Repository Port - Emission State Persistence Interface
//!
//! Durable "symbol → last emitted date" map used for once-per-day dedup
//! and crash recovery. Writes are whole-file and synchronous with the
//! emission that caused them.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::error::ScanError;
use crate::domain::ledger::EmissionLedger;

/// Trait for emission-state persistence.
#[async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
  /// Load the persisted ledger.
  ///
  /// Never fails: a missing or unreadable file yields an empty ledger.
  async fn load(&self) -> EmissionLedger;

  /// Atomically overwrite the durable form with `ledger`.
  async fn save(&self, ledger: &EmissionLedger) -> Result<(), ScanError>;

  /// Drop entries not dated `today` and persist the result.
  ///
  /// The in-memory ledger is pruned even when the save fails.
  async fn prune(&self, ledger: &mut EmissionLedger, today: NaiveDate) -> Result<usize, ScanError> {
    let dropped = ledger.prune(today);
    self.save(ledger).await?;
    Ok(dropped)
  }
}
