//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the scanner's core workflows.
//!
//! Use cases:
//! - `ScanOrchestrator`: repeating concurrent scan loop
//! - `EmissionGate`: serialized policy check, persistence and delivery
//! - `ReconnectPolicy`: stale-connection detection and backoff

pub mod gate;
pub mod reconnect;
pub mod scanner;

pub use gate::{EmissionGate, Submission};
pub use reconnect::{ReconnectPolicy, Session};
pub use scanner::{ScanOrchestrator, ScanSettings, SymbolOutcome};
