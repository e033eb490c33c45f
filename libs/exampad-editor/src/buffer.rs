use serde::{Deserialize, Serialize};

/// Caret or highlighted range, in character offsets.
///
/// Always normalized so that `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn caret(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_caret()
    }
}

/// The full source text plus its selection.
///
/// Offsets are counted in `char`s, never bytes. Every mutation goes through
/// [`Buffer::replace_range`]; the selection is clamped to `[0, len]` after
/// each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    text: String,
    len: usize,
    selection: Selection,
}

impl Buffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            text,
            len,
            selection: Selection::caret(0),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(selection.start.min(self.len), selection.end.min(self.len));
    }

    pub fn set_caret(&mut self, pos: usize) {
        self.set_selection(Selection::caret(pos));
    }

    pub fn selected_text(&self) -> &str {
        self.slice(self.selection.start, self.selection.end)
    }

    /// `1 + number of '\n'`; an empty buffer still has one line.
    pub fn line_count(&self) -> usize {
        1 + self.text.matches('\n').count()
    }

    /// Zero-based line containing `pos`.
    pub fn line_of(&self, pos: usize) -> usize {
        self.text.chars().take(pos).filter(|&c| c == '\n').count()
    }

    fn byte_of(&self, pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(pos)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    pub fn slice(&self, start: usize, end: usize) -> &str {
        let (start, end) = (start.min(self.len), end.min(self.len));
        let (start, end) = (start.min(end), start.max(end));
        &self.text[self.byte_of(start)..self.byte_of(end)]
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.text.chars().nth(pos)
    }

    pub fn char_before(&self, pos: usize) -> Option<char> {
        pos.checked_sub(1).and_then(|p| self.char_at(p))
    }

    /// Offset of the first character of the line containing `pos`.
    pub fn line_start(&self, pos: usize) -> usize {
        let mut start = 0;
        for (i, c) in self.text.chars().take(pos.min(self.len)).enumerate() {
            if c == '\n' {
                start = i + 1;
            }
        }
        start
    }

    /// Offset of the `'\n'` ending the line containing `pos`, or the buffer
    /// length on the last line.
    pub fn line_end(&self, pos: usize) -> usize {
        self.text
            .chars()
            .enumerate()
            .skip(pos.min(self.len))
            .find(|&(_, c)| c == '\n')
            .map(|(i, _)| i)
            .unwrap_or(self.len)
    }

    /// Replace `[start, end)` with `text` and put the caret at the end of the
    /// inserted text. Returns that caret offset.
    pub fn replace_range(&mut self, start: usize, end: usize, text: &str) -> usize {
        let (start, end) = (start.min(self.len), end.min(self.len));
        let (start, end) = (start.min(end), start.max(end));
        let (byte_start, byte_end) = (self.byte_of(start), self.byte_of(end));

        self.text.replace_range(byte_start..byte_end, text);
        let inserted = text.chars().count();
        self.len = self.len - (end - start) + inserted;

        let caret = start + inserted;
        self.selection = Selection::caret(caret);
        caret
    }

    /// Replace the current selection, caret after the inserted text.
    pub fn replace_selection(&mut self, text: &str) -> usize {
        let Selection { start, end } = self.selection;
        self.replace_range(start, end, text)
    }
}
