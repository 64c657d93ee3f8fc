//! Bounded message history.

use std::collections::VecDeque;

use chrono::Local;
use serde::Serialize;

/// Timestamp format for history entries, e.g. `Aug 22, 14:05`.
const DATETIME_FORMAT: &str = "%b %-d, %H:%M";

/// One chat message the way clients see it.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub author: String,
    pub text: String,
    pub datetime: String,
}

/// The last `limit` messages, oldest first.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Appends a message stamped with the current local time, dropping
    /// the oldest entry once the limit is reached. Returns the stored
    /// entry for broadcasting.
    pub fn add(&mut self, author: impl Into<String>, text: impl Into<String>) -> HistoryEntry {
        let entry = HistoryEntry {
            author: author.into(),
            text: text.into(),
            datetime: Local::now().format(DATETIME_FORMAT).to_string(),
        };
        if self.limit == 0 {
            return entry;
        }
        if self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
