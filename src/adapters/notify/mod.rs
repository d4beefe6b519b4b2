//! Notification Adapters
//!
//! Implementations of the `SignalSink` port:
//! - `telegram`: Telegram Bot API delivery
//! - `tracing_sink`: structured-log output for dry runs
//! - `fanout`: delivers to several sinks at once

pub mod fanout;
pub mod telegram;
pub mod tracing_sink;

pub use fanout::FanoutSink;
pub use telegram::TelegramNotifier;
pub use tracing_sink::TracingSink;
