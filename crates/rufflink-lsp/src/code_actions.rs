//! Code action generation for LSP.
//!
//! Fixes and suppression comments become quick-fix actions; whole-document
//! fixes and import sorting become source actions.

use rufflink_core::{DocumentEdit, Fix};
use serde_json::Value as JsonValue;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, Diagnostic as LspDiagnostic, DocumentChanges, OneOf,
    OptionalVersionedTextDocumentIdentifier, TextDocumentEdit, Url, WorkspaceEdit,
};

use crate::diagnostic_mapper::code_of;
use crate::position::{fix_edit_to_text_edit, to_lsp_text_edit};

pub const SOURCE_FIX_ALL_RUFF: CodeActionKind = CodeActionKind::new("source.fixAll.ruff");
pub const SOURCE_ORGANIZE_IMPORTS_RUFF: CodeActionKind =
    CodeActionKind::new("source.organizeImports.ruff");
pub const NOTEBOOK_SOURCE_FIX_ALL: CodeActionKind = CodeActionKind::new("notebook.source.fixAll");
pub const NOTEBOOK_SOURCE_FIX_ALL_RUFF: CodeActionKind =
    CodeActionKind::new("notebook.source.fixAll.ruff");
pub const NOTEBOOK_SOURCE_ORGANIZE_IMPORTS: CodeActionKind =
    CodeActionKind::new("notebook.source.organizeImports");
pub const NOTEBOOK_SOURCE_ORGANIZE_IMPORTS_RUFF: CodeActionKind =
    CodeActionKind::new("notebook.source.organizeImports.ruff");

pub const ORGANIZE_IMPORTS_TITLE: &str = "Ruff: Organize Imports";
pub const FIX_ALL_TITLE: &str = "Ruff: Fix All";

/// Whole-document actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    OrganizeImports,
    FixAll,
}

impl SourceAction {
    pub fn title(self) -> &'static str {
        match self {
            SourceAction::OrganizeImports => ORGANIZE_IMPORTS_TITLE,
            SourceAction::FixAll => FIX_ALL_TITLE,
        }
    }

    /// The generic kind offered in an unfiltered request.
    pub fn kind(self) -> CodeActionKind {
        match self {
            SourceAction::OrganizeImports => CodeActionKind::SOURCE_ORGANIZE_IMPORTS,
            SourceAction::FixAll => CodeActionKind::SOURCE_FIX_ALL,
        }
    }

    /// Every kind that names this action.
    pub fn kinds(self) -> [CodeActionKind; 4] {
        match self {
            SourceAction::OrganizeImports => [
                CodeActionKind::SOURCE_ORGANIZE_IMPORTS,
                SOURCE_ORGANIZE_IMPORTS_RUFF,
                NOTEBOOK_SOURCE_ORGANIZE_IMPORTS,
                NOTEBOOK_SOURCE_ORGANIZE_IMPORTS_RUFF,
            ],
            SourceAction::FixAll => [
                CodeActionKind::SOURCE_FIX_ALL,
                SOURCE_FIX_ALL_RUFF,
                NOTEBOOK_SOURCE_FIX_ALL,
                NOTEBOOK_SOURCE_FIX_ALL_RUFF,
            ],
        }
    }

    pub fn from_kind(kind: &CodeActionKind) -> Option<Self> {
        [SourceAction::OrganizeImports, SourceAction::FixAll]
            .into_iter()
            .find(|action| action.kinds().contains(kind))
    }
}

pub fn supported_kinds() -> Vec<CodeActionKind> {
    let mut kinds = vec![CodeActionKind::QUICKFIX];
    kinds.extend(SourceAction::FixAll.kinds());
    kinds.extend(SourceAction::OrganizeImports.kinds());
    kinds
}

/// Notebook-scoped kinds act on the whole notebook rather than one cell.
pub fn is_notebook_kind(kind: &CodeActionKind) -> bool {
    kind.as_str().starts_with("notebook.")
}

/// A request for exactly one source action kind, answered eagerly.
pub fn exclusive_request(only: Option<&[CodeActionKind]>) -> Option<(SourceAction, CodeActionKind)> {
    match only? {
        [kind] => SourceAction::from_kind(kind).map(|action| (action, kind.clone())),
        _ => None,
    }
}

/// Whether `kind` passes the request's `only` filter. Filter entries match
/// the kind itself and its sub-kinds.
pub fn is_requested(only: Option<&[CodeActionKind]>, kind: &CodeActionKind) -> bool {
    let Some(only) = only else {
        return true;
    };
    only.iter().any(|filter| {
        let filter = filter.as_str();
        let kind = kind.as_str();
        kind == filter
            || kind
                .strip_prefix(filter)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Workspace edit applying a fix to one document.
pub fn fix_workspace_edit(uri: &Url, version: Option<i32>, fix: &Fix) -> WorkspaceEdit {
    workspace_edit(vec![TextDocumentEdit {
        text_document: OptionalVersionedTextDocumentIdentifier {
            uri: uri.clone(),
            version: Some(version.unwrap_or(0)),
        },
        edits: fix
            .edits
            .iter()
            .map(|edit| OneOf::Left(fix_edit_to_text_edit(edit)))
            .collect(),
    }])
}

pub fn document_edits_to_workspace_edit(edits: &[DocumentEdit]) -> WorkspaceEdit {
    workspace_edit(
        edits
            .iter()
            .map(|edit| TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    uri: edit.uri.clone(),
                    version: Some(edit.version.unwrap_or(0)),
                },
                edits: edit
                    .edits
                    .iter()
                    .map(|e| OneOf::Left(to_lsp_text_edit(e)))
                    .collect(),
            })
            .collect(),
    )
}

fn workspace_edit(edits: Vec<TextDocumentEdit>) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: None,
        document_changes: Some(DocumentChanges::Edits(edits)),
        change_annotations: None,
    }
}

fn quick_fix(
    title: String,
    uri: &Url,
    edit: WorkspaceEdit,
    diagnostic: &LspDiagnostic,
) -> CodeAction {
    CodeAction {
        title,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        edit: Some(edit),
        command: None,
        is_preferred: None,
        disabled: None,
        data: Some(JsonValue::String(uri.to_string())),
    }
}

/// Quick-fix applying the tool's suggested fix for `diagnostic`.
pub fn quick_fix_action(
    uri: &Url,
    version: Option<i32>,
    fix: &Fix,
    diagnostic: &LspDiagnostic,
) -> CodeAction {
    let title = match (fix.message.as_deref(), code_of(diagnostic)) {
        (Some(message), code) if !message.is_empty() => {
            format!("Ruff ({}): {message}", code.unwrap_or_default())
        }
        (_, Some(code)) => format!("Ruff: Fix {code}"),
        _ => "Ruff: Fix".to_string(),
    };
    quick_fix(title, uri, fix_workspace_edit(uri, version, fix), diagnostic)
}

/// Quick-fix adding a suppression comment for `diagnostic`'s rule.
pub fn disable_rule_action(
    uri: &Url,
    version: Option<i32>,
    suppression: &Fix,
    diagnostic: &LspDiagnostic,
) -> CodeAction {
    let title = format!(
        "Ruff ({}): Disable for this line",
        code_of(diagnostic).unwrap_or_default()
    );
    quick_fix(
        title,
        uri,
        fix_workspace_edit(uri, version, suppression),
        diagnostic,
    )
}

/// A source action. `edit: None` defers the edit to `codeAction/resolve`;
/// `data` carries the document URI either way.
pub fn source_action(
    action: SourceAction,
    kind: CodeActionKind,
    uri: &Url,
    edit: Option<WorkspaceEdit>,
    diagnostics: Vec<LspDiagnostic>,
) -> CodeAction {
    CodeAction {
        title: action.title().to_string(),
        kind: Some(kind),
        diagnostics: Some(diagnostics),
        edit,
        command: None,
        is_preferred: None,
        disabled: None,
        data: Some(JsonValue::String(uri.to_string())),
    }
}

/// The document URI stored in an action's `data`.
pub fn action_uri(action: &CodeAction) -> Option<Url> {
    action
        .data
        .as_ref()
        .and_then(JsonValue::as_str)
        .and_then(|s| Url::parse(s).ok())
}
