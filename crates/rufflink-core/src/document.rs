//! The document kinds the engine operates on.
//!
//! A plain text file is sent to the tool as-is. A notebook, and a single cell
//! taken out of one, are sent as notebook JSON so the tool can treat them as
//! `.ipynb` input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Notebook,
    Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markup,
}

/// A notebook cell with its current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub uri: Url,
    pub kind: CellKind,
    pub source: String,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Text {
        uri: Url,
        path: PathBuf,
        source: String,
        version: Option<i32>,
    },
    Notebook {
        uri: Url,
        path: PathBuf,
        version: Option<i32>,
        cells: Vec<Cell>,
    },
    /// One cell, addressed by its own URI. `path` is the owning notebook's.
    Cell {
        path: PathBuf,
        cell: Cell,
    },
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Text { .. } => DocumentKind::Text,
            Document::Notebook { .. } => DocumentKind::Notebook,
            Document::Cell { .. } => DocumentKind::Cell,
        }
    }

    pub fn uri(&self) -> &Url {
        match self {
            Document::Text { uri, .. } | Document::Notebook { uri, .. } => uri,
            Document::Cell { cell, .. } => &cell.uri,
        }
    }

    /// Filesystem path passed to the tool as `--stdin-filename`.
    pub fn path(&self) -> &Path {
        match self {
            Document::Text { path, .. }
            | Document::Notebook { path, .. }
            | Document::Cell { path, .. } => path,
        }
    }

    pub fn version(&self) -> Option<i32> {
        match self {
            Document::Text { version, .. } | Document::Notebook { version, .. } => *version,
            Document::Cell { cell, .. } => cell.version,
        }
    }

    /// Whether the document has no meaningful content. Notebooks are judged by
    /// their code cells.
    pub fn is_blank(&self) -> bool {
        match self {
            Document::Text { source, .. } => source.trim().is_empty(),
            Document::Notebook { cells, .. } => cells
                .iter()
                .filter(|c| c.kind == CellKind::Code)
                .all(|c| c.source.trim().is_empty()),
            Document::Cell { cell, .. } => cell.source.trim().is_empty(),
        }
    }

    /// The bytes written to the tool's stdin.
    pub fn tool_input(&self) -> Result<String, serde_json::Error> {
        match self {
            Document::Text { source, .. } => Ok(source.clone()),
            Document::Notebook { cells, .. } => {
                serde_json::to_string(&NotebookJson::from_cells(cells.iter()))
            }
            Document::Cell { cell, .. } => {
                serde_json::to_string(&NotebookJson::from_cells(std::iter::once(cell)))
            }
        }
    }
}

/// Cell source in notebook JSON: a string or a list of line strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceText {
    Text(String),
    Lines(Vec<String>),
}

impl SourceText {
    /// Joined text. List entries already carry their line terminators.
    pub fn into_text(self) -> String {
        match self {
            SourceText::Text(text) => text,
            SourceText::Lines(lines) => lines.concat(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum CellJson {
    Code {
        #[serde(default)]
        metadata: Value,
        #[serde(default)]
        outputs: Vec<Value>,
        source: SourceText,
    },
    Markdown {
        #[serde(default)]
        metadata: Value,
        source: SourceText,
    },
    Raw {
        #[serde(default)]
        metadata: Value,
        source: SourceText,
    },
}

impl CellJson {
    pub fn is_code(&self) -> bool {
        matches!(self, CellJson::Code { .. })
    }

    pub fn into_source(self) -> String {
        match self {
            CellJson::Code { source, .. }
            | CellJson::Markdown { source, .. }
            | CellJson::Raw { source, .. } => source.into_text(),
        }
    }
}

/// The subset of nbformat 4.5 the tool reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookJson {
    #[serde(default)]
    pub metadata: Value,
    pub nbformat: u32,
    pub nbformat_minor: u32,
    pub cells: Vec<CellJson>,
}

impl NotebookJson {
    pub fn from_cells<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        Self {
            metadata: Value::Object(Default::default()),
            nbformat: 4,
            nbformat_minor: 5,
            cells: cells
                .map(|cell| match cell.kind {
                    CellKind::Code => CellJson::Code {
                        metadata: Value::Null,
                        outputs: Vec::new(),
                        source: SourceText::Text(cell.source.clone()),
                    },
                    CellKind::Markup => CellJson::Markdown {
                        metadata: Value::Null,
                        source: SourceText::Text(cell.source.clone()),
                    },
                })
                .collect(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
