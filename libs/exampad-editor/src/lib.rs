//! Text-editing engine for the exam editor.
//!
//! A [`Buffer`] holds the source text and selection; the interpreter turns key
//! events into replace-range edits on it; [`Editor`] ties both to an undo
//! history and a scroll-synchronized line gutter.

pub mod buffer;
pub mod editor;
pub mod gutter;
pub mod history;
pub mod interpreter;
pub mod keys;

pub use buffer::{Buffer, Selection};
pub use editor::{Editor, KeyOutcome};
pub use gutter::Viewport;
pub use interpreter::{Intent, INDENT_UNIT};
pub use keys::{Key, KeyEvent};
