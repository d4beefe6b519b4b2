//! Telegram Notifier - Bot API Signal Delivery
//!
//! Posts each emitted signal to a chat through the Telegram Bot API
//! (`POST {api}/bot{token}/sendMessage`). Remembers the ids of recently
//! delivered signals so a redelivered signal is acknowledged without a
//! second message.

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::ScanError;
use crate::domain::signal::{ComposedSignal, Direction};
use crate::ports::sink::{SignalSink, SinkError};

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the destination chat id.
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// How many delivered ids are remembered.
const RECENT_CAPACITY: usize = 512;

#[derive(Serialize)]
struct SendMessage<'a> {
  chat_id: &'a str,
  text: &'a str,
  disable_web_page_preview: bool,
}

/// Bounded FIFO set of delivered signal ids.
#[derive(Debug)]
struct RecentIds {
  order: VecDeque<Uuid>,
  seen: HashSet<Uuid>,
  capacity: usize,
}

impl RecentIds {
  fn new(capacity: usize) -> Self {
    Self {
      order: VecDeque::with_capacity(capacity),
      seen: HashSet::with_capacity(capacity),
      capacity,
    }
  }

  fn contains(&self, id: &Uuid) -> bool {
    self.seen.contains(id)
  }

  fn remember(&mut self, id: Uuid) {
    if !self.seen.insert(id) {
      return;
    }
    self.order.push_back(id);
    while self.order.len() > self.capacity {
      if let Some(evicted) = self.order.pop_front() {
        self.seen.remove(&evicted);
      }
    }
  }
}

/// Telegram Bot API sink.
pub struct TelegramNotifier {
  http: Client,
  api_url: String,
  token: String,
  chat_id: String,
  delivered: Mutex<RecentIds>,
}

impl TelegramNotifier {
  /// Create a notifier with explicit credentials.
  ///
  /// # Errors
  /// `FatalStartup` if the HTTP client cannot be built.
  pub fn new(
    api_url: &str,
    token: String,
    chat_id: String,
    timeout: Duration,
  ) -> Result<Self, ScanError> {
    let http = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ScanError::FatalStartup(format!("telegram http client: {e}")))?;

    Ok(Self {
      http,
      api_url: api_url.trim_end_matches('/').to_string(),
      token,
      chat_id,
      delivered: Mutex::new(RecentIds::new(RECENT_CAPACITY)),
    })
  }

  /// Create a notifier from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
  ///
  /// # Errors
  /// `FatalStartup` when either variable is missing or empty.
  pub fn from_env(api_url: &str, timeout: Duration) -> Result<Self, ScanError> {
    let read = |name: &str| {
      std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ScanError::FatalStartup(format!("{name} is not set")))
    };

    let notifier = Self::new(api_url, read(TOKEN_ENV)?, read(CHAT_ID_ENV)?, timeout)?;
    info!(api_url = %notifier.api_url, "Telegram notifier configured");
    Ok(notifier)
  }
}

/// Human-readable message body for one signal.
pub fn format_message(signal: &ComposedSignal) -> String {
  let marker = match signal.direction {
    Direction::Long => "🟢",
    Direction::Short => "🔴",
  };

  let mut text = format!(
    "{marker} {} {} ({}, {}x)\n",
    signal.direction, signal.symbol, signal.trade_type, signal.leverage
  );
  let _ = writeln!(text, "Entry: {}", signal.entry_price);
  let _ = writeln!(text, "TP1: {} ({}%)", signal.tp1, signal.tp1_probability);
  let _ = writeln!(text, "TP2: {} ({}%)", signal.tp2, signal.tp2_probability);
  let _ = writeln!(text, "TP3: {} ({}%)", signal.tp3, signal.tp3_probability);
  let _ = writeln!(text, "SL: {}", signal.stop_loss);
  let _ = write!(text, "Confidence: {}%", signal.confidence);
  if signal.degraded {
    text.push_str("\nDirection from fallback policy");
  }
  text
}

#[async_trait]
impl SignalSink for TelegramNotifier {
  fn name(&self) -> &'static str {
    "telegram"
  }

  #[instrument(skip(self, signal), fields(symbol = %signal.symbol, id = %signal.id))]
  async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError> {
    if self.delivered.lock().await.contains(&signal.id) {
      debug!("Signal already delivered, skipping");
      return Ok(());
    }

    let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
    let text = format_message(signal);
    let body = SendMessage {
      chat_id: &self.chat_id,
      text: &text,
      disable_web_page_preview: true,
    };

    let response = self
      .http
      .post(&url)
      .json(&body)
      .send()
      .await
      .map_err(|e| SinkError::Delivery(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      warn!(status = status.as_u16(), "Telegram rejected message");
      return Err(SinkError::Delivery(format!("telegram status {status}: {detail}")));
    }

    self.delivered.lock().await.remember(signal.id);
    debug!("Signal delivered to Telegram");
    Ok(())
  }
}
