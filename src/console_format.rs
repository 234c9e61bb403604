/// Console formatting module - Pure text layout concerns
///
/// This module handles the text layout used by the report renderer:
/// - Display width of strings (wide Unicode aware)
/// - Padding to a column width with any fill and alignment
/// - Greedy word wrapping with a hanging indent
/// - Re-indenting blocks of nested output
///
/// It knows nothing about tasks or hosts; the report module feeds it
/// pre-built strings.
use std::collections::VecDeque;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Columns that continuation lines of task fields are indented by
pub const FIELD_INDENT: usize = 14;

/// Width that warning blocks are wrapped at
pub const WRAP_WIDTH: usize = 80;

//
// Text Formatting Utilities
//

/// Count the display width of a string, accounting for wide Unicode characters
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Placement of text inside a wider column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    /// The odd column, if any, goes on the right
    Center,
}

/// Pad string with `fill` to at least `width` columns (never truncates)
pub fn pad_with(s: &str, width: usize, fill: char, align: Align) -> String {
    let missing = width.saturating_sub(display_width(s));
    let (left, right) = match align {
        Align::Left => (0, missing),
        Align::Right => (missing, 0),
        Align::Center => (missing / 2, missing - missing / 2),
    };
    let fill = fill.to_string();
    format!("{}{}{}", fill.repeat(left), s, fill.repeat(right))
}

/// Pad string on the right to at least `width` columns (never truncates)
pub fn pad_right(s: &str, width: usize) -> String {
    pad_with(s, width, ' ', Align::Left)
}

/// Pad string on the left to at least `width` columns (never truncates)
pub fn pad_left(s: &str, width: usize) -> String {
    pad_with(s, width, ' ', Align::Right)
}

/// Prefix every line of `text` with `indent` spaces.
///
/// Splits on `\n` only, so a leading or trailing newline yields an
/// indented empty line at that end.
pub fn indent_lines(text: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    text.split('\n').map(|line| format!("{}{}", pad, line)).collect::<Vec<_>>().join("\n")
}

/// Greedy word wrap.
///
/// Tabs expand to 8-column stops and every other whitespace character
/// becomes one space, so runs of spaces inside a line survive. Lines break
/// between words or after a hyphen joining two words, and whitespace left
/// at a break is dropped. Every line starts with `indent` spaces and is at
/// most `width` columns wide; chunks wider than a whole line are split.
pub fn wrap_text(text: &str, width: usize, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let room = width.saturating_sub(indent).max(1);

    let spaced = normalize_whitespace(text);
    let mut chunks: VecDeque<&str> = split_chunks(&spaced).into();
    let is_space = |chunk: &str| chunk.chars().all(|c| c == ' ');

    let mut lines: Vec<String> = Vec::new();
    while !chunks.is_empty() {
        let mut line: Vec<&str> = Vec::new();
        let mut line_width = 0;

        if !lines.is_empty() && chunks.front().copied().is_some_and(is_space) {
            chunks.pop_front();
        }

        while let Some(&chunk) = chunks.front() {
            let chunk_width = display_width(chunk);
            if line_width + chunk_width > room {
                break;
            }
            line.push(chunk);
            line_width += chunk_width;
            chunks.pop_front();
        }

        if let Some(chunk) = chunks.pop_front() {
            if display_width(chunk) > room {
                let (head, tail) = split_long_chunk(chunk, room.saturating_sub(line_width).max(1));
                line.push(head);
                if !tail.is_empty() {
                    chunks.push_front(tail);
                }
            } else {
                chunks.push_front(chunk);
            }
        }

        if line.last().copied().is_some_and(is_space) {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(format!("{}{}", pad, line.concat()));
        }
    }

    lines.join("\n")
}

/// Expand tabs and turn every whitespace character into a single space
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        match c {
            '\t' => {
                let stop = 8 - column % 8;
                out.push_str(&" ".repeat(stop));
                column += stop;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            c if c.is_whitespace() => {
                out.push(' ');
                column += 1;
            }
            c => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Split into runs of spaces and words, with hyphenated words split after
/// each joining hyphen
fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (i, c) in text.char_indices() {
        let space = c == ' ';
        if in_space.is_some_and(|s| s != space) {
            push_chunk(&mut chunks, &text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        push_chunk(&mut chunks, &text[start..]);
    }
    chunks
}

fn push_chunk<'a>(chunks: &mut Vec<&'a str>, chunk: &'a str) {
    if chunk.starts_with(' ') {
        chunks.push(chunk);
        return;
    }

    let chars: Vec<(usize, char)> = chunk.char_indices().collect();
    let letter = |j: Option<usize>| j.and_then(|j| chars.get(j)).is_some_and(|(_, c)| c.is_alphabetic() || *c == '_');
    let hyphen = |j: Option<usize>| j.and_then(|j| chars.get(j)).is_some_and(|(_, c)| *c == '-');

    let mut start = 0;
    for (i, &(offset, c)) in chars.iter().enumerate() {
        if c != '-' {
            continue;
        }
        let back = |n: usize| i.checked_sub(n);
        let joins_before = letter(back(1)) && (letter(back(2)) || (hyphen(back(2)) && letter(back(3))));
        let joins_after = letter(Some(i + 1)) && (letter(Some(i + 2)) || (hyphen(Some(i + 2)) && letter(Some(i + 3))));
        if joins_before && joins_after {
            chunks.push(&chunk[start..offset + 1]);
            start = offset + 1;
        }
    }
    chunks.push(&chunk[start..]);
}

/// Cut a chunk wider than a line so the head fits in `room` columns,
/// preferring to cut after the last hyphen that fits
fn split_long_chunk(chunk: &str, room: usize) -> (&str, &str) {
    let mut end = 0;
    let mut used = 0;
    for (i, c) in chunk.char_indices() {
        let c_width = UnicodeWidthChar::width(c).unwrap_or(1);
        if used + c_width > room && end > 0 {
            break;
        }
        used += c_width;
        end = i + c.len_utf8();
    }

    if let Some(hyphen) = chunk[..end].rfind('-')
        && hyphen > 0
        && chunk[..hyphen].chars().any(|c| c != '-')
    {
        end = hyphen + 1;
    }
    chunk.split_at(end)
}

#[cfg(test)]
#[path = "console_format_test.rs"]
mod console_format_test;
