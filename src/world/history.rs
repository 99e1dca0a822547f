use std::collections::VecDeque;

use crate::world::grid::Grid;

pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Bounded undo/redo stack of full grid snapshots.
///
/// `cursor` always points at the snapshot matching the live grid. Writing
/// after an undo drops everything past the cursor; exceeding the cap evicts
/// the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    entries: VecDeque<Grid>,
    cursor: usize,
    cap: usize,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        HistoryLedger::new(DEFAULT_HISTORY_CAP)
    }
}

impl HistoryLedger {
    pub fn new(cap: usize) -> Self {
        HistoryLedger {
            entries: VecDeque::new(),
            cursor: 0,
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn add(&mut self, snapshot: &Grid) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot.clone());
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.cap {
            self.entries.pop_front();
            self.cursor -= 1;
        }
    }

    /// Forget everything and start over from a single snapshot.
    pub fn reset(&mut self, snapshot: &Grid) {
        self.clear();
        self.add(snapshot);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor < self.entries.len() - 1
    }

    pub fn undo(&mut self) -> Option<Grid> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn redo(&mut self) -> Option<Grid> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn current(&self) -> Option<&Grid> {
        self.entries.get(self.cursor)
    }
}
