//! Persistence Adapters - File Storage
//!
//! Implements the `LedgerRepository` port with an atomic JSON snapshot
//! and archives emitted signals to an append-only CSV log.
//! No database dependency, lightweight and crash-recoverable.

pub mod signal_log;
pub mod state;

pub use signal_log::{read_signal_log, SignalLogRow, SignalLogWriter};
pub use state::StateStore;
