//! Active-signal book.
//!
//! Tracks emitted signals until they expire so the policy can refuse an
//! opposite-direction signal while the previous call is still live. Kept in
//! memory only.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::market::Symbol;
use super::signal::{ComposedSignal, Direction};

/// An emitted signal and the moment it stops counting as active.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSignal {
    pub signal: ComposedSignal,
    pub expires_at: DateTime<Utc>,
}

impl ActiveSignal {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Latest active signal per symbol.
#[derive(Debug, Clone)]
pub struct ActiveSignalBook {
    ttl: Duration,
    entries: HashMap<Symbol, ActiveSignal>,
}

impl ActiveSignalBook {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Register a freshly emitted signal, replacing any previous one.
    pub fn register(&mut self, signal: ComposedSignal, now: DateTime<Utc>) {
        let expires_at = now + self.ttl;
        self.entries
            .insert(signal.symbol.clone(), ActiveSignal { signal, expires_at });
    }

    /// Whether a live signal in the direction opposite to `direction` exists.
    pub fn opposite_active(&self, symbol: &str, direction: Direction, now: DateTime<Utc>) -> bool {
        self.entries.get(symbol).is_some_and(|a| {
            a.is_live(now) && a.signal.direction == direction.opposite()
        })
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, a| a.is_live(now));
        before - self.entries.len()
    }

    /// Live signals, newest first.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<ActiveSignal> {
        let mut live: Vec<_> = self
            .entries
            .values()
            .filter(|a| a.is_live(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.signal.timestamp.cmp(&a.signal.timestamp));
        live
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
