//! Minimal edits between a document's text and the tool's rewritten text.
//!
//! Character offsets in positions are UTF-16 code units. Lines are split on
//! `\r\n`, `\r` and `\n`, the same terminators LSP clients use.

use std::borrow::Cow;
use url::Url;

use crate::diagnostics::{Position, Range};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// Edits for one document (a text file or a single notebook cell).
///
/// `version` is `None` when the document version is unknown; the LSP layer
/// sends `0` in that case. An empty `edits` list means "no change".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub uri: Url,
    pub version: Option<i32>,
    pub edits: Vec<TextEdit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    /// The first line terminator appearing in `text`.
    pub fn detect(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        let idx = bytes.iter().position(|&b| b == b'\r' || b == b'\n')?;
        Some(match (bytes[idx], bytes.get(idx + 1)) {
            (b'\r', Some(b'\n')) => LineEnding::CrLf,
            (b'\r', _) => LineEnding::Cr,
            _ => LineEnding::Lf,
        })
    }
}

/// Rewrite the terminators of `fixed` to the ones `original` uses.
pub fn match_line_endings<'a>(original: &str, fixed: &'a str) -> Cow<'a, str> {
    match (LineEnding::detect(original), LineEnding::detect(fixed)) {
        (Some(expected), Some(actual)) if expected != actual => {
            Cow::Owned(fixed.replace(actual.as_str(), expected.as_str()))
        }
        _ => Cow::Borrowed(fixed),
    }
}

/// Split into lines, each keeping its terminator.
pub fn split_lines_inclusive(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn has_terminator(line: &str) -> bool {
    line.ends_with('\n') || line.ends_with('\r')
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line)
}

pub fn utf16_len(text: &str) -> u32 {
    u32::try_from(text.encode_utf16().count()).unwrap_or(u32::MAX)
}

fn to_line(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Compute the edits turning `original` into `fixed`.
///
/// The common leading and trailing lines are kept and the differing middle is
/// replaced by a single edit. Returns no edits when the texts are equal after
/// line endings are matched.
pub fn reconcile(original: &str, fixed: &str) -> Vec<TextEdit> {
    if original == fixed {
        return Vec::new();
    }
    let fixed = match_line_endings(original, fixed);
    if original == fixed.as_ref() {
        return Vec::new();
    }

    let old_lines = split_lines_inclusive(original);
    let new_lines = split_lines_inclusive(&fixed);

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_lines[prefix..]
        .iter()
        .rev()
        .zip(new_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_end = old_lines.len() - suffix;
    let end = match old_lines.last() {
        Some(last) if suffix == 0 && !has_terminator(last) => {
            Position::new(to_line(old_lines.len() - 1), utf16_len(last))
        }
        _ => Position::new(to_line(old_end), 0),
    };

    vec![TextEdit {
        range: Range::new(Position::new(to_line(prefix), 0), end),
        new_text: new_lines[prefix..new_lines.len() - suffix].concat(),
    }]
}

/// Like [`reconcile`] for a single notebook cell.
///
/// Cell text usually has no trailing newline, while the tool always ends its
/// output with one. One trailing terminator is dropped from `fixed` when
/// `original` does not end with one.
pub fn reconcile_cell(original: &str, fixed: &str) -> Vec<TextEdit> {
    let fixed = if has_terminator(original) {
        fixed
    } else {
        strip_terminator(fixed)
    };
    reconcile(original, fixed)
}

/// Byte offset of `position` in `text`. Positions past the end of a line or
/// of the text are clamped.
pub fn offset_at(text: &str, position: Position) -> usize {
    let lines = split_lines_inclusive(text);
    let line = position.line as usize;
    if line >= lines.len() {
        return text.len();
    }
    let line_start: usize = lines[..line].iter().map(|l| l.len()).sum();
    let content = strip_terminator(lines[line]);
    let mut units = 0u32;
    for (idx, ch) in content.char_indices() {
        if units >= position.character {
            return line_start + idx;
        }
        units += ch.len_utf16() as u32;
    }
    line_start + content.len()
}

/// Apply non-overlapping edits, all expressed against `text`.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut spans: Vec<(usize, usize, &str)> = edits
        .iter()
        .map(|edit| {
            let start = offset_at(text, edit.range.start);
            let end = offset_at(text, edit.range.end).max(start);
            (start, end, edit.new_text.as_str())
        })
        .collect();
    spans.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut result = text.to_string();
    for (start, end, new_text) in spans {
        result.replace_range(start..end, new_text);
    }
    result
}

/// Text of line `line` without its terminator.
pub fn line_at(text: &str, line: usize) -> Option<&str> {
    split_lines_inclusive(text)
        .get(line)
        .map(|l| strip_terminator(l))
}
