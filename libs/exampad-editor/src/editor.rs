use crate::buffer::{Buffer, Selection};
use crate::gutter::Viewport;
use crate::history::History;
use crate::interpreter::{self, Intent};
use crate::keys::KeyEvent;
use tracing::trace;

/// What a key press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    pub intent: Intent,
    /// The buffer text changed (selection-only moves do not count).
    pub changed: bool,
}

/// Buffer + undo history + viewport for one exercise.
#[derive(Debug, Clone)]
pub struct Editor {
    buffer: Buffer,
    history: History,
    viewport: Viewport,
    comment_marker: &'static str,
}

impl Editor {
    pub fn new(text: impl Into<String>, comment_marker: &'static str) -> Self {
        Self {
            buffer: Buffer::new(text),
            history: History::default(),
            viewport: Viewport::default(),
            comment_marker,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn selection(&self) -> Selection {
        self.buffer.selection()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.buffer.set_selection(selection);
    }

    pub fn comment_marker(&self) -> &'static str {
        self.comment_marker
    }

    pub fn set_comment_marker(&mut self, marker: &'static str) {
        self.comment_marker = marker;
    }

    pub fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scroll_to(&mut self, line: usize) {
        let count = self.line_count();
        self.viewport.scroll_to(line, count);
    }

    /// Replace the whole document (load from storage or a template).
    /// History does not cross a load.
    pub fn load(&mut self, text: impl Into<String>) {
        self.buffer = Buffer::new(text);
        self.history.clear();
        self.viewport = Viewport::default();
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyOutcome {
        let intent = interpreter::classify(&self.buffer, event);
        trace!(?intent, key = ?event.key, "Key classified");

        let changed = match intent {
            Intent::Undo => self.undo(),
            Intent::Redo => self.redo(),
            _ => {
                let before = self.buffer.clone();
                interpreter::apply(&mut self.buffer, intent, event, self.comment_marker);
                self.commit(before)
            }
        };

        KeyOutcome { intent, changed }
    }

    /// Insert text at the selection, as a paste would.
    pub fn insert_text(&mut self, text: &str) -> bool {
        let before = self.buffer.clone();
        self.buffer.replace_selection(text);
        self.commit(before)
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.buffer) {
            Some(previous) => {
                self.buffer = previous;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.buffer) {
            Some(next) => {
                self.buffer = next;
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, before: Buffer) -> bool {
        let changed = before.text() != self.buffer.text();
        if changed {
            self.history.record(before);
        }
        changed
    }
}
