//! Notebook synchronization notifications.
//!
//! These arrive as custom methods (`notebookDocument/didOpen` and friends)
//! and are translated into document store updates here.

use rufflink_core::store::{CellSpec, CellStructureChange, ContentChange, OpenedCell};
use rufflink_core::CellKind;
use serde::Deserialize;
use tower_lsp::lsp_types::{
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, Url,
    VersionedTextDocumentIdentifier,
};

use crate::position::content_change;

const MARKUP_CELL: i32 = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookCell {
    pub kind: i32,
    pub document: Url,
}

impl NotebookCell {
    pub fn spec(&self) -> CellSpec {
        CellSpec {
            uri: self.document.clone(),
            kind: if self.kind == MARKUP_CELL {
                CellKind::Markup
            } else {
                CellKind::Code
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookDocument {
    pub uri: Url,
    pub version: i32,
    #[serde(default)]
    pub cells: Vec<NotebookCell>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedNotebookDocumentIdentifier {
    pub uri: Url,
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookDocumentIdentifier {
    pub uri: Url,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenNotebookParams {
    pub notebook_document: NotebookDocument,
    #[serde(default)]
    pub cell_text_documents: Vec<TextDocumentItem>,
}

impl DidOpenNotebookParams {
    pub fn cells(&self) -> Vec<CellSpec> {
        self.notebook_document.cells.iter().map(NotebookCell::spec).collect()
    }

    pub fn opened(&self) -> Vec<OpenedCell> {
        self.cell_text_documents.iter().map(opened_cell).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookCellArray {
    pub start: usize,
    pub delete_count: usize,
    #[serde(default)]
    pub cells: Option<Vec<NotebookCell>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStructure {
    pub array: NotebookCellArray,
    #[serde(default)]
    pub did_open: Option<Vec<TextDocumentItem>>,
    #[serde(default)]
    pub did_close: Option<Vec<TextDocumentIdentifier>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTextContent {
    pub document: VersionedTextDocumentIdentifier,
    pub changes: Vec<TextDocumentContentChangeEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellChanges {
    pub structure: Option<CellStructure>,
    pub data: Option<Vec<NotebookCell>>,
    pub text_content: Option<Vec<CellTextContent>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotebookChange {
    pub cells: Option<CellChanges>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeNotebookParams {
    pub notebook_document: VersionedNotebookDocumentIdentifier,
    #[serde(default)]
    pub change: NotebookChange,
}

impl DidChangeNotebookParams {
    pub fn structure_change(&self) -> Option<CellStructureChange> {
        let structure = self.change.cells.as_ref()?.structure.as_ref()?;
        Some(CellStructureChange {
            start: structure.array.start,
            delete_count: structure.array.delete_count,
            cells: structure
                .array
                .cells
                .iter()
                .flatten()
                .map(NotebookCell::spec)
                .collect(),
            opened: structure.did_open.iter().flatten().map(opened_cell).collect(),
            closed: structure
                .did_close
                .iter()
                .flatten()
                .map(|doc| doc.uri.clone())
                .collect(),
        })
    }

    pub fn kind_changes(&self) -> Vec<CellSpec> {
        self.change
            .cells
            .as_ref()
            .and_then(|cells| cells.data.as_ref())
            .map(|data| data.iter().map(NotebookCell::spec).collect())
            .unwrap_or_default()
    }

    /// Text edits per cell: `(uri, version, changes)`.
    pub fn text_changes(&self) -> Vec<(Url, i32, Vec<ContentChange>)> {
        self.change
            .cells
            .as_ref()
            .and_then(|cells| cells.text_content.as_ref())
            .map(|contents| {
                contents
                    .iter()
                    .map(|content| {
                        (
                            content.document.uri.clone(),
                            content.document.version,
                            content.changes.iter().cloned().map(content_change).collect(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidSaveNotebookParams {
    pub notebook_document: NotebookDocumentIdentifier,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseNotebookParams {
    pub notebook_document: NotebookDocumentIdentifier,
    #[serde(default)]
    pub cell_text_documents: Vec<TextDocumentIdentifier>,
}

fn opened_cell(item: &TextDocumentItem) -> OpenedCell {
    OpenedCell {
        uri: item.uri.clone(),
        text: item.text.clone(),
        version: item.version,
    }
}
