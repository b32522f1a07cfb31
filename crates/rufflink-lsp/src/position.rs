//! Conversions between core positions and LSP positions.
//!
//! Both sides count lines from zero and characters in UTF-16 code units, so
//! the conversions are field copies. Fix edits are the exception: their
//! locations arrive one-based by row and zero-based by column.

use rufflink_core::diagnostics::{Edit, Position as CorePosition, Range as CoreRange};
use rufflink_core::edits::TextEdit as CoreTextEdit;
use rufflink_core::store::ContentChange;
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, TextEdit};

pub fn to_lsp_position(position: CorePosition) -> Position {
    Position {
        line: position.line,
        character: position.character,
    }
}

pub fn to_lsp_range(range: CoreRange) -> Range {
    Range {
        start: to_lsp_position(range.start),
        end: to_lsp_position(range.end),
    }
}

pub fn from_lsp_position(position: Position) -> CorePosition {
    CorePosition::new(position.line, position.character)
}

pub fn from_lsp_range(range: Range) -> CoreRange {
    CoreRange::new(from_lsp_position(range.start), from_lsp_position(range.end))
}

pub fn to_lsp_text_edit(edit: &CoreTextEdit) -> TextEdit {
    TextEdit {
        range: to_lsp_range(edit.range),
        new_text: edit.new_text.clone(),
    }
}

/// A fix edit as an LSP text edit.
pub fn fix_edit_to_text_edit(edit: &Edit) -> TextEdit {
    TextEdit {
        range: Range {
            start: to_lsp_position(edit.location.to_edit_position()),
            end: to_lsp_position(edit.end_location.to_edit_position()),
        },
        new_text: edit.content.clone(),
    }
}

pub fn content_change(event: TextDocumentContentChangeEvent) -> ContentChange {
    ContentChange {
        range: event.range.map(from_lsp_range),
        text: event.text,
    }
}
