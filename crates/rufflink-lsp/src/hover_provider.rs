//! Hover documentation for rule codes in suppression comments.

use rufflink_core::{edits, noqa};
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

/// The rule code under the cursor, when it sits inside a `# noqa: ...` list.
pub fn noqa_code_at(content: &str, position: Position) -> Option<String> {
    let line = edits::line_at(content, position.line as usize)?;
    noqa::code_at(line, position.character)
}

pub fn explanation_hover(markdown: String) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: markdown,
        }),
        range: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_under_cursor() {
        let content = "import os\nimport sys  # noqa: F401, E501\n";
        let at = |character| noqa_code_at(content, Position { line: 1, character });

        assert_eq!(at(20), Some("F401".to_string()));
        assert_eq!(at(26), Some("E501".to_string()));
        assert_eq!(at(3), None);
        assert_eq!(noqa_code_at(content, Position { line: 0, character: 2 }), None);
        assert_eq!(noqa_code_at(content, Position { line: 9, character: 0 }), None);
    }

    #[test]
    fn test_hover_is_markdown() {
        let hover = explanation_hover("# unused-import (F401)".to_string());
        match hover.contents {
            HoverContents::Markup(markup) => {
                assert_eq!(markup.kind, MarkupKind::Markdown);
                assert_eq!(markup.value, "# unused-import (F401)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
