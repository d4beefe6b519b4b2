//! Signal Log - Append-only CSV Archive of Emitted Signals
//!
//! Every accepted signal is appended as one row of `signals.csv`. The
//! header is written when the file is created. The reader deserializes
//! rows by header name, so column order is not part of its contract.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::signal::{ComposedSignal, Direction, TradeType};
use crate::ports::sink::{SignalSink, SinkError};

/// Column order of the archive.
pub const HEADER: [&str; 13] = [
    "symbol",
    "price",
    "direction",
    "tp1",
    "tp2",
    "tp3",
    "sl",
    "confidence",
    "trade_type",
    "timestamp",
    "tp1_possibility",
    "tp2_possibility",
    "tp3_possibility",
];

/// One archived signal, as read back from the CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLogRow {
    pub symbol: String,
    pub price: f64,
    pub direction: Direction,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub sl: f64,
    pub confidence: f64,
    pub trade_type: TradeType,
    pub timestamp: DateTime<Utc>,
    pub tp1_possibility: f64,
    pub tp2_possibility: f64,
    pub tp3_possibility: f64,
}

fn encode_row(signal: &ComposedSignal, with_header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if with_header {
        wtr.write_record(HEADER)?;
    }
    wtr.write_record([
        signal.symbol.clone(),
        signal.entry_price.to_string(),
        signal.direction.to_string(),
        signal.tp1.to_string(),
        signal.tp2.to_string(),
        signal.tp3.to_string(),
        signal.stop_loss.to_string(),
        signal.confidence.to_string(),
        signal.trade_type.to_string(),
        signal.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        signal.tp1_probability.to_string(),
        signal.tp2_probability.to_string(),
        signal.tp3_probability.to_string(),
    ])?;
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// CSV archive sink.
pub struct SignalLogWriter {
    path: PathBuf,
    /// Serializes appends so header detection and row writes don't interleave.
    write_lock: Mutex<()>,
}

impl SignalLogWriter {
    /// Create a writer for `data_dir/file_name`, creating the directory.
    pub async fn new(data_dir: &str, file_name: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            path: dir.join(file_name),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn needs_header(&self) -> bool {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }
}

#[async_trait]
impl SignalSink for SignalLogWriter {
    fn name(&self) -> &'static str {
        "csv_log"
    }

    #[instrument(skip(self, signal), fields(symbol = %signal.symbol, id = %signal.id))]
    async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock().await;

        let bytes = encode_row(signal, self.needs_header().await)
            .map_err(|e| SinkError::Io(format!("encode row: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SinkError::Io(format!("open {}: {e}", self.path.display())))?;

        file.write_all(&bytes)
            .await
            .map_err(|e| SinkError::Io(format!("append: {e}")))?;
        file.flush()
            .await
            .map_err(|e| SinkError::Io(format!("flush: {e}")))?;

        debug!("Signal archived");
        Ok(())
    }
}

/// Read every well-formed row of the archive, oldest first.
///
/// A missing file is an empty history; malformed rows are skipped.
#[instrument]
pub async fn read_signal_log(path: &Path) -> Result<Vec<SignalLogRow>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).context("Failed to read signal log"),
    };

    let mut rdr = csv::Reader::from_reader(bytes.as_slice());
    let mut rows = Vec::new();
    for (line, record) in rdr.deserialize::<SignalLogRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => warn!(line = line + 2, error = %e, "Skipping malformed signal log row"),
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn signal(symbol: &str, direction: Direction) -> ComposedSignal {
        ComposedSignal {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction,
            entry_price: 100.0,
            tp1: 101.5,
            tp2: 103.0,
            tp3: 104.5,
            stop_loss: 98.5,
            confidence: 72.5,
            trade_type: TradeType::Normal,
            tp1_probability: 0.85,
            tp2_probability: 0.7,
            tp3_probability: 0.55,
            leverage: 10,
            degraded: false,
            timestamp: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn writer(dir: &tempfile::TempDir) -> SignalLogWriter {
        SignalLogWriter::new(dir.path().to_str().unwrap(), "signals.csv")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = writer(&dir).await;

        log.emit(&signal("BTCUSDT", Direction::Long)).await.unwrap();
        log.emit(&signal("ETHUSDT", Direction::Short)).await.unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert!(lines[1].starts_with("BTCUSDT,100,LONG,101.5,103,104.5,98.5,72.5,Normal,2026-04-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_read_back_typed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = writer(&dir).await;
        log.emit(&signal("SOLUSDT", Direction::Short)).await.unwrap();

        let rows = read_signal_log(log.path()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "SOLUSDT");
        assert_eq!(rows[0].direction, Direction::Short);
        assert_eq!(rows[0].trade_type, TradeType::Normal);
        assert_eq!(rows[0].sl, 98.5);
        assert_eq!(rows[0].tp3_possibility, 0.55);
    }

    #[tokio::test]
    async fn test_reader_uses_header_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.csv");
        std::fs::write(
            &path,
            "timestamp,symbol,direction,price,tp1,tp2,tp3,sl,confidence,trade_type,tp1_possibility,tp2_possibility,tp3_possibility\n\
             2026-04-01T00:00:00Z,XRPUSDT,LONG,0.5,0.51,0.52,0.53,0.49,61,Scalping,0.9,0.8,0.6\n\
             garbage,row\n",
        )
        .unwrap();

        let rows = read_signal_log(&path).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "XRPUSDT");
        assert_eq!(rows[0].trade_type, TradeType::Scalping);
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows = read_signal_log(&dir.path().join("nope.csv")).await.unwrap();
        assert!(rows.is_empty());
    }
}
