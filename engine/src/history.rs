//! Run history: the most recent runs, newest first, in a bounded ring.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::execution::Classification;
use crate::storage::{KeyValueStore, StoreError, StoreResult};

pub const HISTORY_KEY: &str = "run_history";
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// One executed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: Classification,
    pub source_text: String,
    /// Program output; `None` when the run ended in a definitive error.
    #[serde(default)]
    pub stdout: Option<String>,
    /// Output text when the run ended in a definitive error.
    #[serde(default)]
    pub compiler_error: Option<String>,
    /// Tier that produced the result.
    #[serde(default)]
    pub served_by: String,
}

impl RunRecord {
    pub fn new(source_text: impl Into<String>, status: Classification, output: impl Into<String>) -> Self {
        let output = output.into();
        let (stdout, compiler_error) = if status == Classification::Error {
            (None, Some(output))
        } else {
            (Some(output), None)
        };
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status,
            source_text: source_text.into(),
            stdout,
            compiler_error,
            served_by: String::new(),
        }
    }

    pub fn served_by(mut self, tier: impl Into<String>) -> Self {
        self.served_by = tier.into();
        self
    }
}

/// Bounded, persisted list of recent runs.
pub struct RunHistory<S> {
    store: S,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> RunHistory<S> {
    pub fn new(store: S) -> Self {
        Self::with_capacity(store, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(store: S, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend a record, evicting the oldest beyond capacity.
    pub fn record(&self, record: RunRecord) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut records: VecDeque<RunRecord> = self.load().into();
        records.push_front(record);
        records.truncate(self.capacity);
        self.save(records.make_contiguous())
    }

    /// Records, newest first.
    pub fn list(&self) -> Vec<RunRecord> {
        self.load()
    }

    pub fn get(&self, id: Uuid) -> Option<RunRecord> {
        self.load().into_iter().find(|r| r.id == id)
    }

    pub fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.store.remove(HISTORY_KEY)
    }

    fn save(&self, records: &[RunRecord]) -> StoreResult<()> {
        let json = serde_json::to_string(records)?;
        self.store.set(HISTORY_KEY, &json)
    }

    fn load(&self) -> Vec<RunRecord> {
        match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Corrupted run history, resetting: {}", e);
                if let Err(e) = self.store.remove(HISTORY_KEY) {
                    warn!("Failed to clear corrupted run history: {}", e);
                }
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read run history: {}", e);
                Vec::new()
            }
        }
    }
}
