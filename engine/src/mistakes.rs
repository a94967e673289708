//! Mistake frequency tracker.
//!
//! Watches compiler and runtime output for known error signatures and keeps a
//! per-symbol histogram that survives across sessions. The whole mapping is
//! read, modified and written back under one key (last writer wins).
//! Subscribers are notified through a broadcast channel after every
//! successful mutation.

use std::collections::BTreeMap;
use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::storage::{KeyValueStore, StoreError, StoreResult};

/// Storage key of the persisted mapping.
pub const MISTAKES_KEY: &str = "mistakes";

const CHANNEL_CAPACITY: usize = 64;

struct Signature {
    symbol: &'static str,
    label: &'static str,
    pattern: Regex,
}

fn signature(symbol: &'static str, label: &'static str, pattern: &str) -> Signature {
    Signature {
        symbol,
        label,
        pattern: Regex::new(pattern).unwrap(),
    }
}

static SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        signature("semicolon_expected", "Missing semicolon", r"';' expected|expected ';'"),
        signature("paren_expected", "Missing parenthesis", r"'\)' expected|expected '\)'"),
        signature(
            "brace_or_eof",
            "Unbalanced braces",
            r"reached end of file while parsing|'\}' expected|expected '\}'|expected declaration or statement at end of input",
        ),
        signature(
            "cannot_find_symbol",
            "Unknown name",
            r"cannot find symbol|undeclared \(first use|was not declared in this scope",
        ),
        signature("incompatible_types", "Incompatible types", r"incompatible types"),
        signature(
            "missing_return",
            "Missing return",
            r"missing return statement|control reaches end of non-void function",
        ),
        signature("null_pointer", "Null dereference", r"NullPointerException"),
        signature("array_index", "Array index out of bounds", r"ArrayIndexOutOfBoundsException"),
        signature(
            "string_index",
            "String index out of bounds",
            r"StringIndexOutOfBoundsException",
        ),
        signature("arithmetic", "Arithmetic error", r"ArithmeticException"),
        signature("unreachable", "Unreachable code", r"unreachable statement"),
        signature(
            "uninitialized",
            "Uninitialized variable",
            r"might not have been initialized|is used uninitialized",
        ),
    ]
});

/// All known mistake symbols, in catalog order.
pub fn symbols() -> Vec<&'static str> {
    SIGNATURES.iter().map(|s| s.symbol).collect()
}

/// Human-readable label for a symbol.
pub fn label(symbol: &str) -> Option<&'static str> {
    SIGNATURES.iter().find(|s| s.symbol == symbol).map(|s| s.label)
}

/// Persisted per-symbol record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

pub type MistakeCounts = BTreeMap<String, MistakeRecord>;

/// Notification sent after a persisted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MistakeEvent {
    /// Symbols incremented by one `observe` call, with their new counts.
    Observed(Vec<(String, u64)>),
    Reset(String),
    ResetAll,
}

/// Histogram of recurring mistakes over a [`KeyValueStore`].
pub struct MistakeTracker<S> {
    store: S,
    sender: broadcast::Sender<MistakeEvent>,
    // Read-modify-write of the whole mapping happens under this lock.
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> MistakeTracker<S> {
    pub fn new(store: S) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            store,
            sender,
            write_lock: Mutex::new(()),
        }
    }

    /// Subscribe to mutation events.
    pub fn subscribe(&self) -> broadcast::Receiver<MistakeEvent> {
        self.sender.subscribe()
    }

    /// Current mapping. Corrupted state is replaced with an empty mapping.
    pub fn counts(&self) -> MistakeCounts {
        self.load()
    }

    /// Symbols sorted by count, highest first.
    pub fn top(&self, limit: usize) -> Vec<(String, u64)> {
        let mut all: Vec<(String, u64)> = self
            .load()
            .into_iter()
            .map(|(symbol, record)| (symbol, record.count))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(limit);
        all
    }

    /// Count every signature found in `text` once. Returns whether anything
    /// matched, even when the updated counts could not be persisted (that
    /// failure is logged).
    pub fn observe(&self, text: &str) -> bool {
        let matched: Vec<&Signature> = SIGNATURES
            .iter()
            .filter(|s| s.pattern.is_match(text))
            .collect();
        if matched.is_empty() {
            return false;
        }

        let result = self.mutate(|counts| {
            let now = Utc::now();
            let mut updated = Vec::with_capacity(matched.len());
            for sig in &matched {
                let record = counts
                    .entry(sig.symbol.to_string())
                    .or_insert(MistakeRecord {
                        count: 0,
                        last_seen: now,
                    });
                record.count += 1;
                record.last_seen = now;
                updated.push((sig.symbol.to_string(), record.count));
            }
            MistakeEvent::Observed(updated)
        });

        match result {
            Ok(()) => debug!(symbols = matched.len(), "Recorded mistakes"),
            Err(e) => error!("Failed to persist mistake counts: {}", e),
        }
        true
    }

    /// Forget one symbol.
    pub fn reset(&self, symbol: &str) -> StoreResult<()> {
        let symbol = symbol.to_string();
        self.mutate(|counts| {
            counts.remove(&symbol);
            MistakeEvent::Reset(symbol.clone())
        })
    }

    /// Forget everything.
    pub fn reset_all(&self) -> StoreResult<()> {
        self.mutate(|counts| {
            counts.clear();
            MistakeEvent::ResetAll
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut MistakeCounts) -> MistakeEvent) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut counts = self.load();
        let event = f(&mut counts);
        let json = serde_json::to_string(&counts)?;
        self.store.set(MISTAKES_KEY, &json)?;
        // No subscribers is not an error.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn load(&self) -> MistakeCounts {
        let raw = match self.store.get(MISTAKES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return MistakeCounts::new(),
            Err(e) => {
                warn!("Failed to read mistake counts: {}", e);
                return MistakeCounts::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Corrupted mistake counts, resetting: {}", e);
                if let Err(e) = self.store.remove(MISTAKES_KEY) {
                    warn!("Failed to clear corrupted mistake counts: {}", e);
                }
                MistakeCounts::new()
            }
        }
    }
}
