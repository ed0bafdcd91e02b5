//! Run history: the last few orchestration reports, kept in memory.

use std::collections::VecDeque;

use crate::gate::CompositeReport;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Ring buffer of completed runs, oldest first.
#[derive(Debug)]
pub struct RunHistory {
    entries: VecDeque<CompositeReport>,
    capacity: usize,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, report: CompositeReport) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(report);
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<CompositeReport> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn last(&self) -> Option<&CompositeReport> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new()
    }
}
