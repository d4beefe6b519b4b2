//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O, HTTP servers). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `exchange`: Binance spot REST market data
//! - `analysis`: reference indicator/prediction analyzer
//! - `notify`: Telegram, dry-run and fan-out signal sinks
//! - `metrics`: Prometheus export, health/status server, memory probe
//! - `persistence`: JSON emission ledger and CSV signal log

pub mod analysis;
pub mod exchange;
pub mod metrics;
pub mod notify;
pub mod persistence;
