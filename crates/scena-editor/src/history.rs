//! History hooks.
//!
//! The editor reports every committed change as a `HistoryEntry`: frame
//! renders (one entry per finished gesture), appends, removals and moves.
//! Replaying entries is left to the embedding application; the bounded
//! `HistoryRecorder` only keeps them.

use scena_core::{Detached, ElementId, FrameCapture, MoveRecord};
use std::collections::VecDeque;

/// Frame state of one element before and after a change.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameChange {
    pub id: ElementId,
    pub before: FrameCapture,
    pub after: FrameCapture,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Render {
        changes: Vec<FrameChange>,
    },
    Append {
        ids: Vec<ElementId>,
        prev_selection: Vec<ElementId>,
    },
    Remove {
        removed: Vec<Detached>,
        prev_selection: Vec<ElementId>,
    },
    Move {
        moves: Vec<MoveRecord>,
        changes: Vec<FrameChange>,
    },
}

impl HistoryEntry {
    pub fn description(&self) -> &'static str {
        match self {
            HistoryEntry::Render { .. } => "render",
            HistoryEntry::Append { .. } => "append",
            HistoryEntry::Remove { .. } => "remove",
            HistoryEntry::Move { .. } => "move",
        }
    }
}

/// Receives committed changes.
pub trait HistoryHook {
    fn record(&mut self, entry: HistoryEntry);
}

/// Keeps the most recent `max_depth` entries.
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    entries: VecDeque<HistoryEntry>,
    max_depth: usize,
}

impl HistoryRecorder {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_depth.min(64)),
            max_depth,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl HistoryHook for HistoryRecorder {
    fn record(&mut self, entry: HistoryEntry) {
        if self.max_depth == 0 {
            return;
        }
        log::trace!("history: {}", entry.description());
        self.entries.push_back(entry);
        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render() -> HistoryEntry {
        HistoryEntry::Render {
            changes: Vec::new(),
        }
    }

    #[test]
    fn recorder_is_bounded() {
        let mut history = HistoryRecorder::new(2);
        history.record(render());
        history.record(HistoryEntry::Append {
            ids: Vec::new(),
            prev_selection: Vec::new(),
        });
        history.record(render());
        assert_eq!(history.len(), 2);
        let kinds: Vec<_> = history.entries().map(HistoryEntry::description).collect();
        assert_eq!(kinds, vec!["append", "render"]);
    }

    #[test]
    fn zero_depth_keeps_nothing() {
        let mut history = HistoryRecorder::new(0);
        history.record(render());
        assert!(history.is_empty());
    }
}
