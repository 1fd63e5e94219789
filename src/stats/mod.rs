//! Request counters
//!
//! The endpoint reports one [`Outcome`] per request to a [`CounterSink`].
//! Reporting never blocks the request and never fails it.

mod db;

pub use db::{StatsDb, StatsSnapshot};

use std::sync::Arc;
use tracing::warn;

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    InvalidInput,
    AllVariantsFailed,
}

impl Outcome {
    /// Counter column of this outcome
    pub fn column(&self) -> &'static str {
        match self {
            Outcome::Success => "ok",
            Outcome::InvalidInput => "invalid_input",
            Outcome::AllVariantsFailed => "all_failed",
        }
    }
}

/// Receives request outcomes
pub trait CounterSink: Send + Sync {
    fn notify(&self, outcome: Outcome);
}

/// Counting disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCounters;

impl CounterSink for NoCounters {
    fn notify(&self, _outcome: Outcome) {}
}

/// Writes outcomes to a [`StatsDb`] on the blocking pool
#[derive(Clone)]
pub struct SqliteCounters {
    db: Arc<StatsDb>,
}

impl SqliteCounters {
    pub fn new(db: Arc<StatsDb>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<StatsDb> {
        &self.db
    }
}

impl CounterSink for SqliteCounters {
    fn notify(&self, outcome: Outcome) {
        let db = Arc::clone(&self.db);
        let write = move || {
            if let Err(e) = db.record(outcome) {
                warn!("Failed to count {:?}: {:#}", outcome, e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

/// Keeps outcomes in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingCounters {
    outcomes: std::sync::Mutex<Vec<Outcome>>,
}

#[cfg(test)]
impl RecordingCounters {
    pub(crate) fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl CounterSink for RecordingCounters {
    fn notify(&self, outcome: Outcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }
}
