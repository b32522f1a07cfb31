//! # rufflink-core
//!
//! Translation layer between editor requests and the `ruff` executable.
//!
//! Covers:
//! - Version-gated capabilities of the installed `ruff`
//! - Layered workspace settings and per-document resolution
//! - Executable discovery and subprocess invocation
//! - Parsing of `ruff check --output-format json` across schema generations
//! - Minimal text edits between a document and the tool's rewritten source
//! - Plain files, notebooks and single notebook cells as one document type
//!
//! The LSP transport lives in `rufflink-lsp`; nothing here depends on it.

pub mod args;
pub mod diagnostics;
pub mod document;
pub mod edits;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod locator;
pub mod noqa;
pub mod output;
pub mod process;
pub mod settings;
pub mod stdlib;
pub mod store;
pub mod version;

mod regex_util;

pub use diagnostics::{
    Applicability, Diagnostic, Edit, Fix, Location, Position, Range, Severity,
};
pub use document::{Cell, CellKind, Document, DocumentKind};
pub use edits::{reconcile, reconcile_cell, DocumentEdit, TextEdit};
pub use engine::{Engine, EngineOptions};
pub use error::{EngineError, EngineResult};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use settings::{SettingsRegistry, UserSettings, WorkspaceSettings};
pub use store::DocumentStore;
pub use version::{Capabilities, Operation, VersionRange};

/// Name shown to users in diagnostics, titles and messages.
pub const TOOL_DISPLAY: &str = "Ruff";
