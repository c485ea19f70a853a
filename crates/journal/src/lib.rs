//! In-memory journal of actor activity.
//!
//! Every noteworthy step of a task (state changes, safety verdicts, tool
//! validation, failures) is appended here so it can be inspected after the
//! fact. Entries are also emitted as `tracing` events under the
//! `actor_journal` target; the buffer is bounded and drops the oldest
//! entries first.

use std::collections::VecDeque;

use actor_core_types::{JournalTrack, TaskId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use url::Url;

pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

#[derive(Clone, Debug, Serialize)]
pub struct JournalEntry {
    pub url: Option<Url>,
    pub task_id: TaskId,
    pub track: JournalTrack,
    pub event: String,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct AggregatedJournal {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl AggregatedJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn log(
        &self,
        url: Option<&Url>,
        task_id: TaskId,
        track: JournalTrack,
        event: &str,
        details: impl Into<String>,
    ) {
        let details = details.into();
        debug!(
            target: "actor_journal",
            task = task_id.value(),
            %track,
            url = url.map(Url::as_str).unwrap_or(""),
            event,
            details,
        );
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(JournalEntry {
            url: url.cloned(),
            task_id,
            track,
            event: event.to_string(),
            details,
            recorded_at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Most recent entries, newest last.
    pub fn tail(&self, count: usize) -> Vec<JournalEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for AggregatedJournal {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_CAPACITY)
    }
}
