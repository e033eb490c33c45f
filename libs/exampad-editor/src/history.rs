use crate::buffer::Buffer;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 200;

/// Snapshot undo/redo stacks. One snapshot per buffer-changing key outcome,
/// so each interpreter edit undoes as a single step.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Buffer>,
    redo: Vec<Buffer>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remember the state before an edit. Any redo branch is discarded.
    pub fn record(&mut self, before: Buffer) {
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(before);
        self.redo.clear();
    }

    pub fn undo(&mut self, current: &Buffer) -> Option<Buffer> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    pub fn redo(&mut self, current: &Buffer) -> Option<Buffer> {
        let next = self.redo.pop()?;
        self.undo.push_back(current.clone());
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
