//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export on :9090, the health/status
//! server (/live, /ready, /health, /signals) via axum 0.7, and the
//! resident memory probe recorded once per cycle.

pub mod health;
pub mod prometheus;
pub mod resources;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
pub use resources::resident_memory_bytes;
