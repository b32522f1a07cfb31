//! Parser for `ruff check --output-format json`.
//!
//! Three fix payload generations exist in the wild; all are normalized into
//! [`Fix`] here and nowhere else:
//!
//! - a single `content`/`location`/`end_location` replacement,
//! - an `edits` list with zero-based columns,
//! - an `edits` list with one-based columns.
//!
//! The two `edits` generations share a shape, so the executable's
//! [`FixSchema`] decides how their columns are read.

use serde::Deserialize;

use crate::diagnostics::{Applicability, Diagnostic, Edit, Fix, Location, Range};
use crate::version::{Capabilities, FixSchema};

#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
    location: Location,
    end_location: Location,
    #[serde(default)]
    fix: Option<RawFix>,
    #[serde(default)]
    noqa_row: Option<u32>,
    #[serde(default)]
    cell: Option<usize>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFix {
    Edits {
        #[serde(default)]
        applicability: Option<Applicability>,
        #[serde(default)]
        message: Option<String>,
        edits: Vec<Edit>,
    },
    Single {
        #[serde(default)]
        message: Option<String>,
        content: String,
        location: Location,
        end_location: Location,
    },
}

impl RawFix {
    fn shape(&self) -> FixSchema {
        match self {
            RawFix::Single { .. } => FixSchema::SingleEdit,
            RawFix::Edits {
                applicability: Some(_),
                ..
            } => FixSchema::EditsOneBased,
            RawFix::Edits { .. } => FixSchema::Edits,
        }
    }

    fn normalize(self, schema: FixSchema) -> Fix {
        match self {
            RawFix::Single {
                message,
                content,
                location,
                end_location,
            } => Fix {
                applicability: None,
                message,
                edits: vec![Edit {
                    content,
                    location,
                    end_location,
                }],
            },
            RawFix::Edits {
                applicability,
                message,
                edits,
            } => Fix {
                applicability,
                message,
                edits: if schema == FixSchema::EditsOneBased {
                    edits.into_iter().map(shift_columns).collect()
                } else {
                    edits
                },
            },
        }
    }
}

fn shift_columns(edit: Edit) -> Edit {
    Edit {
        location: Location::new(edit.location.row, edit.location.column - 1),
        end_location: Location::new(edit.end_location.row, edit.end_location.column - 1),
        ..edit
    }
}

/// Parse the tool's JSON findings.
///
/// Empty output means no findings. Syntax errors are dropped when
/// `show_syntax_errors` is false.
pub fn parse_findings(
    content: &[u8],
    capabilities: &Capabilities,
    show_syntax_errors: bool,
) -> Result<Vec<Diagnostic>, serde_json::Error> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let raw: Vec<RawFinding> = serde_json::from_slice(content)?;

    Ok(raw
        .into_iter()
        .filter(|finding| {
            show_syntax_errors || !capabilities.is_syntax_error_code(finding.code.as_deref())
        })
        .map(|finding| {
            let start = finding.location.to_position();
            let end = finding.end_location.to_position().max(start);
            let fix = finding.fix.map(|fix| {
                let shape = fix.shape();
                if shape != capabilities.fix_schema {
                    tracing::debug!(
                        ?shape,
                        expected = ?capabilities.fix_schema,
                        version = %capabilities.version,
                        "Fix payload looks like another generation"
                    );
                }
                fix.normalize(capabilities.fix_schema)
            });
            let mut diagnostic =
                Diagnostic::new(Range::new(start, end), finding.message, finding.code);
            diagnostic.url = finding.url;
            diagnostic.fix = fix;
            diagnostic.noqa_row = finding.noqa_row;
            diagnostic.cell = finding.cell;
            diagnostic
        })
        .collect())
}
