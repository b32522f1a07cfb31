//! Diagnostic and fix types shared by the parser, the engine and the LSP layer.
//!
//! Positions here are zero-based with `character` counted in UTF-16 code
//! units. [`Location`] keeps the tool's own row/column convention and is only
//! converted at the edge.

use serde::{Deserialize, Serialize};

/// Codes reported with error severity. Everything else is a warning.
const ERROR_CODES: &[&str] = &["E902", "E999", "F821"];

/// Codes whose findings mark code as unnecessary (unused import/variable).
const UNNECESSARY_CODES: &[&str] = &["F401", "F841"];

/// Zero-based position in a document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A row/column pair as emitted by the tool.
///
/// Rows are one-based. Whether columns are zero- or one-based depends on the
/// output schema generation; after [`crate::output`] normalization the column
/// of every fix edit is zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub row: i64,
    pub column: i64,
}

impl Location {
    pub const fn new(row: i64, column: i64) -> Self {
        Self { row, column }
    }

    /// Zero-based LSP position for a diagnostic location (one-based row and column).
    pub fn to_position(self) -> Position {
        Position::new(to_u32(self.row - 1), to_u32(self.column - 1))
    }

    /// Zero-based LSP position for a normalized fix edit location
    /// (one-based row, zero-based column).
    pub fn to_edit_position(self) -> Position {
        Position::new(to_u32(self.row - 1), to_u32(self.column))
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Severity for a finding's code. Findings without a code are syntax
    /// errors and therefore errors.
    pub fn for_code(code: Option<&str>) -> Self {
        match code {
            None => Severity::Error,
            Some(code) if ERROR_CODES.contains(&code) => Severity::Error,
            Some(_) => Severity::Warning,
        }
    }
}

/// How safe the tool considers a fix.
///
/// Recognizes both the current names (`safe`, `unsafe`, `display-only`) and the
/// legacy ones. Unknown names become [`Applicability::Unspecified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Applicability {
    Safe,
    Unsafe,
    DisplayOnly,
    Automatic,
    Suggested,
    Manual,
    Unspecified,
}

impl Applicability {
    pub fn as_str(self) -> &'static str {
        match self {
            Applicability::Safe => "safe",
            Applicability::Unsafe => "unsafe",
            Applicability::DisplayOnly => "display-only",
            Applicability::Automatic => "Automatic",
            Applicability::Suggested => "Suggested",
            Applicability::Manual => "Manual",
            Applicability::Unspecified => "Unspecified",
        }
    }
}

impl From<String> for Applicability {
    fn from(value: String) -> Self {
        match value.as_str() {
            "safe" | "Safe" => Applicability::Safe,
            "unsafe" | "Unsafe" => Applicability::Unsafe,
            "display-only" | "DisplayOnly" | "display" => Applicability::DisplayOnly,
            "Automatic" | "automatic" => Applicability::Automatic,
            "Suggested" | "suggested" => Applicability::Suggested,
            "Manual" | "manual" => Applicability::Manual,
            _ => Applicability::Unspecified,
        }
    }
}

impl From<Applicability> for String {
    fn from(value: Applicability) -> Self {
        value.as_str().to_string()
    }
}

/// One replacement inside a fix. Locations are normalized: one-based row,
/// zero-based column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub content: String,
    pub location: Location,
    pub end_location: Location,
}

/// A suggested fix in the normalized (multi-edit) shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(default)]
    pub applicability: Option<Applicability>,
    #[serde(default)]
    pub message: Option<String>,
    pub edits: Vec<Edit>,
}

/// A normalized finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    /// Rule code. `None` for syntax errors.
    pub code: Option<String>,
    pub severity: Severity,
    /// Link to the rule documentation.
    pub url: Option<String>,
    /// Finding flags unused code.
    pub unnecessary: bool,
    pub fix: Option<Fix>,
    /// One-based row where a suppression comment belongs.
    pub noqa_row: Option<u32>,
    /// One-based notebook cell the finding belongs to.
    pub cell: Option<usize>,
}

impl Diagnostic {
    /// Build a diagnostic, deriving severity and the unnecessary tag from the code.
    pub fn new(range: Range, message: impl Into<String>, code: Option<String>) -> Self {
        let severity = Severity::for_code(code.as_deref());
        let unnecessary = code
            .as_deref()
            .is_some_and(|c| UNNECESSARY_CODES.contains(&c));
        Self {
            range,
            message: message.into(),
            code,
            severity,
            url: None,
            unnecessary,
            fix: None,
            noqa_row: None,
            cell: None,
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        self.code.is_none()
    }

    /// Human-readable message prefixed with the rule code when there is one.
    pub fn display_message(&self) -> String {
        match &self.code {
            Some(code) => format!("{code} {}", self.message),
            None => self.message.clone(),
        }
    }
}
