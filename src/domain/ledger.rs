//! Emission Ledger - "symbol → last emitted date" bookkeeping.
//!
//! The ledger is the in-memory form of the State Store. It holds at most
//! one `EmissionRecord` per symbol and is pruned to the current UTC date
//! at the start of every cycle.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use super::market::Symbol;

/// Last emission for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionRecord {
    pub symbol: Symbol,
    /// UTC calendar date of the last emission.
    pub last_emitted_date: NaiveDate,
    pub last_emitted_at: DateTime<Utc>,
}

/// Map from symbol to its latest `EmissionRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmissionLedger {
    records: BTreeMap<Symbol, EmissionRecord>,
}

impl EmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = EmissionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.symbol.clone(), r))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&EmissionRecord> {
        self.records.get(symbol)
    }

    /// Whether `symbol` already emitted on `date`.
    pub fn emitted_on(&self, symbol: &str, date: NaiveDate) -> bool {
        self.records
            .get(symbol)
            .is_some_and(|r| r.last_emitted_date == date)
    }

    /// Insert or replace the record for `symbol`, dated by the UTC day
    /// of `at`.
    pub fn record(&mut self, symbol: &str, at: DateTime<Utc>) {
        self.records.insert(
            symbol.to_string(),
            EmissionRecord {
                symbol: symbol.to_string(),
                last_emitted_date: at.date_naive(),
                last_emitted_at: at,
            },
        );
    }

    /// Drop every record not dated `today`. Returns how many were dropped.
    pub fn prune(&mut self, today: NaiveDate) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.last_emitted_date == today);
        before - self.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &EmissionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-cycle bookkeeping. Created at cycle start, dropped at cycle end.
#[derive(Debug, Clone)]
pub struct CycleContext {
    /// UTC date all dedup comparisons of this cycle use.
    pub date: NaiveDate,
    processed: HashSet<Symbol>,
}

impl CycleContext {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            processed: HashSet::new(),
        }
    }

    pub fn is_processed(&self, symbol: &str) -> bool {
        self.processed.contains(symbol)
    }

    /// Mark `symbol` as handled; returns false if it already was.
    pub fn mark_processed(&mut self, symbol: &str) -> bool {
        self.processed.insert(symbol.to_string())
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}
