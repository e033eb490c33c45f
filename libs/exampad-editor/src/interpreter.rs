/// Key-Event Interpreter
///
/// Classifies a key event into one handled intent, in fixed priority order
/// (first match wins), then applies it to the buffer as replace-range edits.
/// Keys that match no rule resolve to [`Intent::Native`], the default
/// insertion/deletion step, so there is no implicit fall-through.
///
/// Everything here is synchronous string math with no failure modes.

use crate::buffer::{Buffer, Selection};
use crate::keys::{Key, KeyEvent};

pub const INDENT_UNIT: &str = "    ";
const INDENT_WIDTH: usize = 4;

const WRAP_OPENERS: [char; 5] = ['"', '\'', '(', '{', '['];
const CLOSERS: [char; 3] = ['}', ']', ')'];
const BLOCK_OPENERS: [char; 4] = ['{', '(', '[', ':'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Undo,
    Redo,
    WrapSelection { open: char, close: char },
    ToggleComment,
    Indent,
    Outdent,
    ExpandBraces,
    NewlineIndent,
    OutdentClose(char),
    SkipClose(char),
    AutoClose { open: char, close: char },
    /// Default text-area behavior: insert the typed character, delete, or
    /// move the caret.
    Native,
}

pub fn closing_pair(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '{' => Some('}'),
        '[' => Some(']'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}

pub fn classify(buffer: &Buffer, event: &KeyEvent) -> Intent {
    let selection = buffer.selection();

    // 1. undo / redo
    if event.command() {
        match event.key {
            Key::Char('z') if event.shift => return Intent::Redo,
            Key::Char('Z') => return Intent::Redo,
            Key::Char('z') => return Intent::Undo,
            Key::Char('y') | Key::Char('Y') => return Intent::Redo,
            _ => {}
        }
    }

    // 2. wrap a non-empty selection
    if let Some(c) = event.typed_char() {
        if !selection.is_caret() && WRAP_OPENERS.contains(&c) {
            if let Some(close) = closing_pair(c) {
                return Intent::WrapSelection { open: c, close };
            }
        }
    }

    // 3. line comment
    if event.command() && event.key == Key::Char('/') {
        return Intent::ToggleComment;
    }

    // 4. indentation
    if event.key == Key::Tab && !event.command() {
        return if event.shift {
            Intent::Outdent
        } else {
            Intent::Indent
        };
    }

    // 5. / 6. enter
    if event.key == Key::Enter && !event.command() {
        if selection.is_caret()
            && buffer.char_before(selection.start) == Some('{')
            && buffer.char_at(selection.start) == Some('}')
        {
            return Intent::ExpandBraces;
        }
        return Intent::NewlineIndent;
    }

    if let Some(c) = event.typed_char() {
        // 7. closing bracket
        if CLOSERS.contains(&c) && selection.is_caret() {
            let caret = selection.start;
            let line_start = buffer.line_start(caret);
            let line = buffer.slice(line_start, buffer.line_end(caret));
            let before = buffer.slice(line_start, caret);
            if line.chars().count() >= INDENT_WIDTH
                && line.chars().all(char::is_whitespace)
                && before.ends_with(INDENT_UNIT)
            {
                return Intent::OutdentClose(c);
            }
            if buffer.char_at(caret) == Some(c) {
                return Intent::SkipClose(c);
            }
        }

        // 8. opening bracket or quote
        if selection.is_caret() {
            if let Some(close) = closing_pair(c) {
                return Intent::AutoClose { open: c, close };
            }
        }
    }

    Intent::Native
}

/// Apply a non-history intent. Undo/redo are owned by the editor and are a
/// no-op here.
pub fn apply(buffer: &mut Buffer, intent: Intent, event: &KeyEvent, comment_marker: &str) {
    match intent {
        Intent::Undo | Intent::Redo => {}
        Intent::WrapSelection { open, close } => wrap_selection(buffer, open, close),
        Intent::ToggleComment => toggle_comment(buffer, comment_marker),
        Intent::Indent => indent(buffer),
        Intent::Outdent => outdent(buffer),
        Intent::ExpandBraces => expand_braces(buffer),
        Intent::NewlineIndent => newline_indent(buffer),
        Intent::OutdentClose(c) => outdent_close(buffer, c),
        Intent::SkipClose(_) => {
            let caret = buffer.selection().start;
            buffer.set_caret(caret + 1);
        }
        Intent::AutoClose { open, close } => {
            let caret = buffer.replace_selection(&format!("{open}{close}"));
            buffer.set_caret(caret - 1);
        }
        Intent::Native => native(buffer, event),
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn wrap_selection(buffer: &mut Buffer, open: char, close: char) {
    let Selection { start, end } = buffer.selection();
    let wrapped = format!("{open}{}{close}", buffer.selected_text());
    buffer.replace_range(start, end, &wrapped);
    buffer.set_selection(Selection::new(start + 1, end + 1));
}

/// Comment or uncomment every line touched by the selection.
///
/// The region counts as commented when all non-blank lines start with the
/// marker after their indentation; blank lines are never commented.
pub fn toggle_comment(buffer: &mut Buffer, marker: &str) {
    let selection = buffer.selection();
    let region_start = buffer.line_start(selection.start);
    let region_end = buffer.line_end(selection.end);
    let region = buffer.slice(region_start, region_end).to_string();
    let lines: Vec<&str> = region.split('\n').collect();

    let all_commented = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .all(|line| line.trim_start().starts_with(marker));

    let toggled: Vec<String> = lines
        .iter()
        .map(|line| {
            if all_commented {
                uncomment_line(line, marker)
            } else {
                comment_line(line, marker)
            }
        })
        .collect();

    let end = buffer.replace_range(region_start, region_end, &toggled.join("\n"));
    buffer.set_selection(Selection::new(region_start, end));
}

fn comment_line(line: &str, marker: &str) -> String {
    if line.trim().is_empty() {
        return line.to_string();
    }
    let indent = leading_whitespace(line);
    format!("{indent}{marker} {}", &line[indent.len()..])
}

fn uncomment_line(line: &str, marker: &str) -> String {
    let indent = leading_whitespace(line);
    match line[indent.len()..].strip_prefix(marker) {
        Some(rest) => format!("{indent}{}", rest.strip_prefix(' ').unwrap_or(rest)),
        None => line.to_string(),
    }
}

/// Prepend one indent unit to every line spanned by the selection.
pub fn indent(buffer: &mut Buffer) {
    let selection = buffer.selection();
    let first = buffer.line_start(selection.start);
    let last_end = buffer.line_end(selection.end);
    let region = buffer.slice(first, last_end).to_string();

    let lines: Vec<String> = region.split('\n').map(|l| format!("{INDENT_UNIT}{l}")).collect();
    let inserted = lines.len() * INDENT_WIDTH;
    buffer.replace_range(first, last_end, &lines.join("\n"));

    // A caret at column 0 stays put while its end moves, selecting the new indent
    let start = if selection.start > first {
        selection.start + INDENT_WIDTH
    } else {
        selection.start
    };
    buffer.set_selection(Selection::new(start, selection.end + inserted));
}

fn outdent_width(line: &str) -> usize {
    if line.starts_with(INDENT_UNIT) {
        INDENT_WIDTH
    } else if line.starts_with("  ") {
        2
    } else if line.starts_with(' ') {
        1
    } else {
        0
    }
}

/// Remove up to one indent unit from every line spanned by the selection.
pub fn outdent(buffer: &mut Buffer) {
    let selection = buffer.selection();
    let first = buffer.line_start(selection.start);
    let last_end = buffer.line_end(selection.end);
    let region = buffer.slice(first, last_end).to_string();

    let mut removed = Vec::new();
    let lines: Vec<&str> = region
        .split('\n')
        .map(|line| {
            let width = outdent_width(line);
            removed.push(width);
            &line[width..]
        })
        .collect();

    if removed.iter().all(|&w| w == 0) {
        return;
    }
    buffer.replace_range(first, last_end, &lines.join("\n"));

    // Shift an offset by everything removed before it, without letting it
    // cross back over its own line start.
    let translate = |pos: usize| -> usize {
        let mut line_start = first;
        let mut shift = 0;
        for (line, width) in region.split('\n').zip(&removed) {
            let len = line.chars().count();
            if pos <= line_start + len {
                let column = pos - line_start;
                return pos - shift - column.min(*width);
            }
            shift += width;
            line_start += len + 1;
        }
        pos - shift
    };

    buffer.set_selection(Selection::new(translate(selection.start), translate(selection.end)));
}

fn expand_braces(buffer: &mut Buffer) {
    let caret = buffer.selection().start;
    let line_start = buffer.line_start(caret);
    let indent = leading_whitespace(buffer.slice(line_start, caret)).to_string();

    buffer.replace_range(caret, caret, &format!("\n{indent}{INDENT_UNIT}\n{indent}"));
    buffer.set_caret(caret + 1 + indent.chars().count() + INDENT_WIDTH);
}

fn newline_indent(buffer: &mut Buffer) {
    let selection = buffer.selection();
    let line_start = buffer.line_start(selection.start);
    let before = buffer.slice(line_start, selection.start);

    let mut indent = leading_whitespace(before).to_string();
    if before.trim_end().ends_with(BLOCK_OPENERS) {
        indent.push_str(INDENT_UNIT);
    }
    buffer.replace_selection(&format!("\n{indent}"));
}

fn outdent_close(buffer: &mut Buffer, close: char) {
    let caret = buffer.selection().start;
    buffer.replace_range(caret - INDENT_WIDTH, caret, &close.to_string());
}

fn native(buffer: &mut Buffer, event: &KeyEvent) {
    let selection = buffer.selection();
    match event.key {
        Key::Char(c) if !event.command() => {
            buffer.replace_selection(&c.to_string());
        }
        Key::Backspace => {
            if !selection.is_caret() {
                buffer.replace_selection("");
            } else if selection.start > 0 {
                buffer.replace_range(selection.start - 1, selection.start, "");
            }
        }
        Key::Delete => {
            if !selection.is_caret() {
                buffer.replace_selection("");
            } else {
                buffer.replace_range(selection.start, selection.start + 1, "");
            }
        }
        Key::Left => {
            if selection.is_caret() {
                buffer.set_caret(selection.start.saturating_sub(1));
            } else {
                buffer.set_caret(selection.start);
            }
        }
        Key::Right => {
            if selection.is_caret() {
                buffer.set_caret(selection.end + 1);
            } else {
                buffer.set_caret(selection.end);
            }
        }
        _ => {}
    }
}
