//! Open documents, notebooks and the cells that belong to them.

use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

use crate::diagnostics::Range;
use crate::document::{Cell, CellKind, Document};
use crate::edits::offset_at;

/// A content change. `range: None` replaces the whole text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub range: Option<Range>,
    pub text: String,
}

/// A notebook cell slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpec {
    pub uri: Url,
    pub kind: CellKind,
}

/// Text of a cell opened together with its notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedCell {
    pub uri: Url,
    pub text: String,
    pub version: i32,
}

/// Cells `start..start + delete_count` replaced by `cells`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStructureChange {
    pub start: usize,
    pub delete_count: usize,
    pub cells: Vec<CellSpec>,
    pub opened: Vec<OpenedCell>,
    pub closed: Vec<Url>,
}

#[derive(Debug, Clone)]
struct TextEntry {
    text: String,
    version: i32,
}

#[derive(Debug, Clone)]
struct NotebookEntry {
    version: i32,
    cells: Vec<CellSpec>,
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    texts: HashMap<Url, TextEntry>,
    notebooks: HashMap<Url, NotebookEntry>,
    cell_owner: HashMap<Url, Url>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_text(&mut self, uri: Url, text: String, version: i32) {
        self.texts.insert(uri, TextEntry { text, version });
    }

    /// Apply changes in order. Returns `false` for an unknown document.
    pub fn change_text(&mut self, uri: &Url, version: i32, changes: &[ContentChange]) -> bool {
        let Some(entry) = self.texts.get_mut(uri) else {
            return false;
        };
        for change in changes {
            match change.range {
                None => entry.text = change.text.clone(),
                Some(range) => {
                    let start = offset_at(&entry.text, range.start);
                    let end = offset_at(&entry.text, range.end).max(start);
                    entry.text.replace_range(start..end, &change.text);
                }
            }
        }
        entry.version = version;
        true
    }

    pub fn close_text(&mut self, uri: &Url) -> bool {
        self.texts.remove(uri).is_some()
    }

    pub fn text(&self, uri: &Url) -> Option<&str> {
        self.texts.get(uri).map(|entry| entry.text.as_str())
    }

    pub fn open_notebook(
        &mut self,
        uri: Url,
        version: i32,
        cells: Vec<CellSpec>,
        opened: Vec<OpenedCell>,
    ) {
        for cell in &cells {
            self.cell_owner.insert(cell.uri.clone(), uri.clone());
        }
        for cell in opened {
            self.open_text(cell.uri, cell.text, cell.version);
        }
        self.notebooks.insert(uri, NotebookEntry { version, cells });
    }

    pub fn set_notebook_version(&mut self, uri: &Url, version: i32) -> bool {
        match self.notebooks.get_mut(uri) {
            Some(entry) => {
                entry.version = version;
                true
            }
            None => false,
        }
    }

    /// Insert, remove or replace cells.
    pub fn change_cell_structure(&mut self, uri: &Url, change: CellStructureChange) -> bool {
        let Some(entry) = self.notebooks.get_mut(uri) else {
            return false;
        };
        let start = change.start.min(entry.cells.len());
        let end = (start + change.delete_count).min(entry.cells.len());
        let removed: Vec<CellSpec> = entry.cells.splice(start..end, change.cells.clone()).collect();

        for cell in &removed {
            self.cell_owner.remove(&cell.uri);
        }
        for cell in &change.cells {
            self.cell_owner.insert(cell.uri.clone(), uri.clone());
        }
        for closed in &change.closed {
            self.texts.remove(closed);
        }
        for cell in change.opened {
            self.open_text(cell.uri, cell.text, cell.version);
        }
        true
    }

    /// Update the kind of existing cells.
    pub fn change_cell_kinds(&mut self, uri: &Url, updates: &[CellSpec]) {
        if let Some(entry) = self.notebooks.get_mut(uri) {
            for update in updates {
                if let Some(cell) = entry.cells.iter_mut().find(|c| c.uri == update.uri) {
                    cell.kind = update.kind;
                }
            }
        }
    }

    /// Forget a notebook and its cells. Returns the cell URIs.
    pub fn close_notebook(&mut self, uri: &Url) -> Vec<Url> {
        let Some(entry) = self.notebooks.remove(uri) else {
            return Vec::new();
        };
        entry
            .cells
            .into_iter()
            .map(|cell| {
                self.cell_owner.remove(&cell.uri);
                self.texts.remove(&cell.uri);
                cell.uri
            })
            .collect()
    }

    pub fn is_notebook(&self, uri: &Url) -> bool {
        self.notebooks.contains_key(uri)
    }

    pub fn notebook_of(&self, cell_uri: &Url) -> Option<&Url> {
        self.cell_owner.get(cell_uri)
    }

    /// Top-level open documents: text files and notebooks, not cells.
    pub fn open_documents(&self) -> Vec<Url> {
        self.texts
            .keys()
            .filter(|uri| !self.cell_owner.contains_key(*uri))
            .chain(self.notebooks.keys())
            .cloned()
            .collect()
    }

    pub fn notebook_cells(&self, uri: &Url) -> Option<&[CellSpec]> {
        self.notebooks.get(uri).map(|entry| entry.cells.as_slice())
    }

    /// The whole document `uri` belongs to: the owning notebook for a cell,
    /// the notebook itself, or the text document.
    pub fn document(&self, uri: &Url) -> Option<Document> {
        if let Some(owner) = self.cell_owner.get(uri) {
            return self.notebook_document(owner);
        }
        if self.notebooks.contains_key(uri) {
            return self.notebook_document(uri);
        }
        self.text_document(uri)
    }

    /// Like [`DocumentStore::document`], but a cell URI yields just that cell.
    pub fn cell_or_text(&self, uri: &Url) -> Option<Document> {
        match self.cell_owner.get(uri) {
            Some(owner) => {
                let path = file_path(owner)?;
                let spec = self
                    .notebooks
                    .get(owner)?
                    .cells
                    .iter()
                    .find(|c| &c.uri == uri)?;
                Some(Document::Cell {
                    path,
                    cell: self.cell(spec),
                })
            }
            None => self.document(uri),
        }
    }

    pub fn notebook_document(&self, uri: &Url) -> Option<Document> {
        let entry = self.notebooks.get(uri)?;
        Some(Document::Notebook {
            uri: uri.clone(),
            path: file_path(uri)?,
            version: Some(entry.version),
            cells: entry.cells.iter().map(|spec| self.cell(spec)).collect(),
        })
    }

    fn text_document(&self, uri: &Url) -> Option<Document> {
        let entry = self.texts.get(uri)?;
        Some(Document::Text {
            uri: uri.clone(),
            path: file_path(uri)?,
            source: entry.text.clone(),
            version: Some(entry.version),
        })
    }

    fn cell(&self, spec: &CellSpec) -> Cell {
        let entry = self.texts.get(&spec.uri);
        Cell {
            uri: spec.uri.clone(),
            kind: spec.kind,
            source: entry.map(|e| e.text.clone()).unwrap_or_default(),
            version: entry.map(|e| e.version),
        }
    }
}

fn file_path(uri: &Url) -> Option<PathBuf> {
    match uri.to_file_path() {
        Ok(path) => Some(path),
        Err(()) => {
            tracing::debug!(%uri, "Not a file URI");
            None
        }
    }
}
