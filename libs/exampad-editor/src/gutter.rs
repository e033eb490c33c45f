use std::ops::RangeInclusive;

/// Scroll position shared by the text view and the line-number gutter.
///
/// There is exactly one offset, so the two panes cannot drift apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    scroll_line: usize,
}

impl Viewport {
    /// Scroll so that `line` (zero-based) is the first visible line.
    pub fn scroll_to(&mut self, line: usize, line_count: usize) {
        self.scroll_line = line.min(line_count.saturating_sub(1));
    }

    pub fn text_scroll(&self) -> usize {
        self.scroll_line
    }

    pub fn gutter_scroll(&self) -> usize {
        self.scroll_line
    }

    /// One-based line numbers the gutter shows for `rows` visible rows.
    pub fn gutter_numbers(&self, line_count: usize, rows: usize) -> RangeInclusive<usize> {
        let first = self.gutter_scroll() + 1;
        let last = (self.gutter_scroll() + rows).min(line_count.max(1));
        first..=last.max(first)
    }
}
