//! LSP backend for rufflink.
//!
//! Keeps the open documents, turns editor events into engine operations and
//! engine results into diagnostics, code actions, edits and hovers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rufflink_core::document::CellKind;
use rufflink_core::settings::{Run, WorkspaceSettings};
use rufflink_core::{
    noqa, Document, DocumentEdit, DocumentStore, Engine, EngineError, EngineOptions,
    EngineResult, Lifecycle,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error as RpcError, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::code_actions::{
    action_uri, disable_rule_action, document_edits_to_workspace_edit, exclusive_request,
    is_notebook_kind, is_requested, quick_fix_action, source_action, supported_kinds,
    SourceAction,
};
use crate::diagnostic_mapper::{
    code_of, diagnostic_data, group_by_cell, is_ruff_diagnostic, to_lsp_diagnostics,
};
use crate::hover_provider::{explanation_hover, noqa_code_at};
use crate::init_options::InitializationOptions;
use crate::logging::{LogHandle, ShowNotification};
use crate::notebook::{
    DidChangeNotebookParams, DidCloseNotebookParams, DidOpenNotebookParams, DidSaveNotebookParams,
};
use crate::position::{content_change, from_lsp_range, to_lsp_text_edit};

pub const APPLY_AUTOFIX: &str = "ruff.applyAutofix";
pub const APPLY_ORGANIZE_IMPORTS: &str = "ruff.applyOrganizeImports";
pub const APPLY_FORMAT: &str = "ruff.applyFormat";

const COMMANDS: [&str; 3] = [APPLY_AUTOFIX, APPLY_ORGANIZE_IMPORTS, APPLY_FORMAT];

/// `notebookDocumentSync` for Python cells in any notebook. The protocol
/// types in use predate notebooks, so it is written out by hand.
fn notebook_sync_capability() -> JsonValue {
    serde_json::json!({
        "notebookDocumentSync": {
            "notebookSelector": [{ "cells": [{ "language": "python" }] }],
            "save": true
        }
    })
}

/// Argument of the `ruff.apply*` commands.
#[derive(Debug, Deserialize)]
struct CommandTarget {
    uri: Url,
}

/// LSP backend that runs Ruff for open documents.
///
/// Documents and notebooks live in a [`DocumentStore`]; every tool run goes
/// through the shared [`Engine`], which owns settings and the executable.
pub struct Backend {
    client: Client,
    engine: Arc<Engine>,
    documents: RwLock<DocumentStore>,
    lifecycle: RwLock<Lifecycle>,
    /// Client resolves code action edits lazily.
    resolve_edits: AtomicBool,
    log: Option<LogHandle>,
    notify: ShowNotification,
}

impl Backend {
    /// Create a backend with default engine options.
    pub fn new(client: Client) -> Self {
        Self::with_options(client, EngineOptions::default(), None)
    }

    pub fn with_options(client: Client, options: EngineOptions, log: Option<LogHandle>) -> Self {
        Self {
            client,
            engine: Arc::new(Engine::new(options)),
            documents: RwLock::new(DocumentStore::new()),
            lifecycle: RwLock::new(Lifecycle::new()),
            resolve_edits: AtomicBool::new(false),
            log,
            notify: ShowNotification::from_env(),
        }
    }

    async fn show(&self, kind: MessageType, message: String) {
        if self.notify.shows(kind) {
            self.client.show_message(kind, message.clone()).await;
        }
        self.client.log_message(kind, message).await;
    }

    /// Report a failed operation.
    ///
    /// Capability and tool failures pop up. A missing executable and
    /// unreadable output are only logged.
    async fn report(&self, operation: &str, err: &EngineError) {
        let message = format!("{operation} failed: {err}");
        if err.is_user_visible() {
            tracing::error!(error = %err, "{operation} failed");
            self.client
                .show_message(MessageType::ERROR, message.clone())
                .await;
            self.client.log_message(MessageType::ERROR, message).await;
        } else if err.is_missing_executable() || err.is_malformed_output() {
            tracing::warn!(error = %err, "{operation} failed");
            self.show(MessageType::WARNING, message).await;
        } else {
            tracing::error!(error = %err, "{operation} failed");
            self.show(MessageType::ERROR, message).await;
        }
    }

    async fn edits_or_report(
        &self,
        operation: &str,
        result: EngineResult<Option<Vec<DocumentEdit>>>,
    ) -> Option<Vec<DocumentEdit>> {
        match result {
            Ok(edits) => edits,
            Err(err) => {
                self.report(operation, &err).await;
                None
            }
        }
    }

    async fn apply_settings(&self, options: InitializationOptions) {
        let (global, workspaces) = options.into_parts();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        self.engine.configure(global, &workspaces, &cwd).await;
        if let Some(log) = &self.log {
            log.set_level(self.engine.log_level().await);
        }
    }

    /// No tool runs once the client asked for shutdown.
    async fn is_shutting_down(&self) -> bool {
        let shutting_down = self.lifecycle.read().await.is_shutting_down();
        if shutting_down {
            tracing::debug!("Ignoring work after shutdown");
        }
        shutting_down
    }

    async fn settings_for(&self, uri: &Url) -> Option<Arc<WorkspaceSettings>> {
        let path = uri.to_file_path().ok()?;
        Some(self.engine.settings_for(&path).await)
    }

    async fn lints_on_change(&self, uri: &Url) -> bool {
        match self.settings_for(uri).await {
            Some(settings) => settings.lint.run == Run::OnType,
            None => false,
        }
    }

    /// Lint a text document or notebook and publish the results.
    async fn lint_and_publish(&self, uri: &Url) {
        if self.is_shutting_down().await {
            return;
        }
        let Some(document) = self.documents.read().await.document(uri) else {
            return;
        };
        match self.engine.lint(&document).await {
            Ok(diagnostics) => {
                self.publish(&document, diagnostics.as_deref().unwrap_or_default())
                    .await
            }
            Err(err) if err.is_missing_executable() => {
                self.report("Linting", &err).await;
                self.publish(&document, &[]).await;
            }
            // Previous diagnostics stay.
            Err(err) => self.report("Linting", &err).await,
        }
    }

    async fn publish(&self, document: &Document, diagnostics: &[rufflink_core::Diagnostic]) {
        match document {
            Document::Notebook { cells, .. } => {
                let mut grouped = group_by_cell(diagnostics);
                for (index, cell) in cells.iter().enumerate() {
                    if cell.kind != CellKind::Code {
                        continue;
                    }
                    let cell_diagnostics = grouped.remove(&(index + 1)).unwrap_or_default();
                    self.client
                        .publish_diagnostics(cell.uri.clone(), cell_diagnostics, cell.version)
                        .await;
                }
            }
            _ => {
                self.client
                    .publish_diagnostics(
                        document.uri().clone(),
                        to_lsp_diagnostics(diagnostics),
                        document.version(),
                    )
                    .await;
            }
        }
    }

    async fn clear(&self, uris: impl IntoIterator<Item = Url>) {
        for uri in uris {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }

    fn source_action_enabled(action: SourceAction, settings: &WorkspaceSettings) -> bool {
        match action {
            SourceAction::OrganizeImports => settings.organize_imports,
            SourceAction::FixAll => settings.fix_all,
        }
    }

    /// The edit of a source action. Notebook kinds act on the whole
    /// notebook; the others on the requested cell or file.
    async fn source_edit(
        &self,
        action: SourceAction,
        kind: &CodeActionKind,
        uri: &Url,
    ) -> Option<WorkspaceEdit> {
        if self.is_shutting_down().await {
            return None;
        }
        let document = {
            let documents = self.documents.read().await;
            if is_notebook_kind(kind) {
                documents.document(uri)
            } else {
                documents.cell_or_text(uri)
            }
        }?;
        let edits = match action {
            SourceAction::OrganizeImports => {
                let result = self.engine.organize_imports(&document).await;
                self.edits_or_report("Organizing imports", result).await
            }
            SourceAction::FixAll => {
                let result = self.engine.fix(&document, None).await;
                self.edits_or_report("Fixing", result).await
            }
        }?;
        Some(document_edits_to_workspace_edit(&edits))
    }

    async fn format_edits(&self, uri: &Url, range: Option<Range>) -> Option<Vec<TextEdit>> {
        if self.is_shutting_down().await {
            return None;
        }
        let document = self.documents.read().await.cell_or_text(uri)?;
        let result = self
            .engine
            .format(&document, range.map(from_lsp_range))
            .await;
        let operation = if range.is_some() {
            "Range formatting"
        } else {
            "Formatting"
        };
        let edits = self.edits_or_report(operation, result).await?;
        Some(
            edits
                .iter()
                .filter(|edit| &edit.uri == uri)
                .flat_map(|edit| edit.edits.iter().map(to_lsp_text_edit))
                .collect(),
        )
    }

    pub async fn did_open_notebook(&self, params: DidOpenNotebookParams) {
        let uri = params.notebook_document.uri.clone();
        tracing::debug!(%uri, "Notebook opened");
        self.documents.write().await.open_notebook(
            uri.clone(),
            params.notebook_document.version,
            params.cells(),
            params.opened(),
        );
        self.lint_and_publish(&uri).await;
    }

    pub async fn did_change_notebook(&self, params: DidChangeNotebookParams) {
        let uri = params.notebook_document.uri.clone();
        let mut closed = Vec::new();
        {
            let mut documents = self.documents.write().await;
            if !documents.set_notebook_version(&uri, params.notebook_document.version) {
                tracing::warn!(%uri, "Change for a notebook that is not open");
                return;
            }
            if let Some(structure) = params.structure_change() {
                closed = structure.closed.clone();
                documents.change_cell_structure(&uri, structure);
            }
            documents.change_cell_kinds(&uri, &params.kind_changes());
            for (cell, version, changes) in params.text_changes() {
                documents.change_text(&cell, version, &changes);
            }
        }
        self.clear(closed).await;
        if self.lints_on_change(&uri).await {
            self.lint_and_publish(&uri).await;
        }
    }

    pub async fn did_save_notebook(&self, params: DidSaveNotebookParams) {
        self.lint_and_publish(&params.notebook_document.uri).await;
    }

    pub async fn did_close_notebook(&self, params: DidCloseNotebookParams) {
        let cells = self
            .documents
            .write()
            .await
            .close_notebook(&params.notebook_document.uri);
        self.clear(cells).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if !self.lifecycle.write().await.initialize() {
            tracing::warn!("Received a second initialize request");
        }

        let resolve_edits = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|text| text.code_action.as_ref())
            .and_then(|action| action.resolve_support.as_ref())
            .is_some_and(|support| support.properties.iter().any(|p| p == "edit"));
        self.resolve_edits.store(resolve_edits, Ordering::Relaxed);

        self.apply_settings(InitializationOptions::parse(params.initialization_options))
            .await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                experimental: Some(notebook_sync_capability()),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(supported_kinds()),
                        resolve_provider: Some(true),
                        work_done_progress_options: Default::default(),
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "rufflink-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.lifecycle.write().await.activate();
        self.client
            .log_message(MessageType::INFO, "rufflink-lsp initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.lifecycle.write().await.shutdown();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.open_text(
            uri.clone(),
            params.text_document.text,
            params.text_document.version,
        );
        self.lint_and_publish(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let changes: Vec<_> = params
            .content_changes
            .into_iter()
            .map(content_change)
            .collect();
        let known = self
            .documents
            .write()
            .await
            .change_text(&uri, params.text_document.version, &changes);
        if !known {
            tracing::warn!(%uri, "Change for a document that is not open");
            return;
        }
        if self.lints_on_change(&uri).await {
            self.lint_and_publish(&uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.lint_and_publish(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.close_text(&uri);
        self.clear([uri]).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let options = InitializationOptions::parse(Some(params.settings));
        if options == InitializationOptions::default() {
            tracing::debug!("Configuration change without settings");
            return;
        }
        self.apply_settings(options).await;

        let open = self.documents.read().await.open_documents();
        for uri in open {
            self.lint_and_publish(&uri).await;
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let Some(document) = self.documents.read().await.cell_or_text(&uri) else {
            return Ok(None);
        };
        let settings = self.engine.settings_for(document.path()).await;
        if self.engine.is_skipped(document.path(), &settings).await {
            return Ok(None);
        }

        let only = params.context.only.as_deref();
        let ours: Vec<&Diagnostic> = params
            .context
            .diagnostics
            .iter()
            .filter(|d| is_ruff_diagnostic(d))
            .collect();
        let fixable = || -> Vec<Diagnostic> {
            ours.iter()
                .filter(|d| diagnostic_data(d.data.as_ref()).fix.is_some())
                .map(|d| (*d).clone())
                .collect()
        };

        if let Some((action, kind)) = exclusive_request(only) {
            if Self::source_action_enabled(action, &settings) {
                let diagnostics = match action {
                    SourceAction::FixAll => fixable(),
                    SourceAction::OrganizeImports => Vec::new(),
                };
                let actions = match self.source_edit(action, &kind, &uri).await {
                    Some(edit) => vec![CodeActionOrCommand::CodeAction(source_action(
                        action,
                        kind,
                        &uri,
                        Some(edit),
                        diagnostics,
                    ))],
                    None => Vec::new(),
                };
                return Ok(Some(actions));
            }
        }

        let mut actions = Vec::new();

        if is_requested(only, &CodeActionKind::QUICKFIX) {
            let version = document.version();
            if settings.fix_violation {
                for diagnostic in &ours {
                    if let Some(fix) = diagnostic_data(diagnostic.data.as_ref()).fix {
                        actions.push(quick_fix_action(&uri, version, &fix, diagnostic));
                    }
                }
            }
            if settings.disable_rule_comment {
                let text = self.documents.read().await.text(&uri).map(str::to_string);
                if let Some(text) = text {
                    for diagnostic in &ours {
                        let data = diagnostic_data(diagnostic.data.as_ref());
                        let (Some(row), Some(code)) = (data.noqa_row, code_of(diagnostic)) else {
                            continue;
                        };
                        let Some(line) =
                            rufflink_core::edits::line_at(&text, row.saturating_sub(1) as usize)
                        else {
                            continue;
                        };
                        let suppression = noqa::suppression_fix(line, row, code);
                        actions.push(disable_rule_action(&uri, version, &suppression, diagnostic));
                    }
                }
            }
        }

        let mut responses: Vec<CodeActionOrCommand> =
            actions.into_iter().map(CodeActionOrCommand::CodeAction).collect();

        for action in [SourceAction::OrganizeImports, SourceAction::FixAll] {
            let kind = action.kind();
            if !Self::source_action_enabled(action, &settings) || !is_requested(only, &kind) {
                continue;
            }
            if self.resolve_edits.load(Ordering::Relaxed) {
                responses.push(CodeActionOrCommand::CodeAction(source_action(
                    action,
                    kind,
                    &uri,
                    None,
                    Vec::new(),
                )));
            } else if let Some(edit) = self.source_edit(action, &kind, &uri).await {
                let diagnostics = match action {
                    SourceAction::FixAll => fixable(),
                    SourceAction::OrganizeImports => Vec::new(),
                };
                responses.push(CodeActionOrCommand::CodeAction(source_action(
                    action,
                    kind,
                    &uri,
                    Some(edit),
                    diagnostics,
                )));
            }
        }

        Ok((!responses.is_empty()).then_some(responses))
    }

    async fn code_action_resolve(&self, params: CodeAction) -> Result<CodeAction> {
        let mut action = params;
        let (Some(uri), Some(kind)) = (action_uri(&action), action.kind.clone()) else {
            return Ok(action);
        };
        let Some(source) = SourceAction::from_kind(&kind) else {
            return Ok(action);
        };
        let Some(settings) = self.settings_for(&uri).await else {
            return Ok(action);
        };
        if Self::source_action_enabled(source, &settings) {
            action.edit = self.source_edit(source, &kind, &uri).await;
        }
        Ok(action)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<JsonValue>> {
        if !COMMANDS.contains(&params.command.as_str()) {
            return Err(RpcError::invalid_params(format!(
                "Unknown command: {}",
                params.command
            )));
        }
        let Some(target) = params
            .arguments
            .first()
            .and_then(|arg| serde_json::from_value::<CommandTarget>(arg.clone()).ok())
        else {
            return Err(RpcError::invalid_params(format!(
                "{} expects a text document argument",
                params.command
            )));
        };
        if self.is_shutting_down().await {
            return Ok(None);
        }
        let Some(document) = self.documents.read().await.document(&target.uri) else {
            tracing::warn!(uri = %target.uri, "Command for a document that is not open");
            return Ok(None);
        };

        let edits = match params.command.as_str() {
            APPLY_AUTOFIX => {
                let result = self.engine.fix(&document, None).await;
                self.edits_or_report("Fixing", result).await
            }
            APPLY_ORGANIZE_IMPORTS => {
                let result = self.engine.organize_imports(&document).await;
                self.edits_or_report("Organizing imports", result).await
            }
            _ => {
                let result = self.engine.format(&document, None).await;
                self.edits_or_report("Formatting", result).await
            }
        };

        if let Some(edits) = edits {
            if let Err(err) = self
                .client
                .apply_edit(document_edits_to_workspace_edit(&edits))
                .await
            {
                tracing::warn!(error = %err, command = %params.command, "workspace/applyEdit failed");
            }
        }
        Ok(None)
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        Ok(self.format_edits(&params.text_document.uri, None).await)
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        Ok(self
            .format_edits(&params.text_document.uri, Some(params.range))
            .await)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let (code, path) = {
            let documents = self.documents.read().await;
            let Some(text) = documents.text(&uri) else {
                return Ok(None);
            };
            let Some(code) = noqa_code_at(text, position) else {
                return Ok(None);
            };
            let Some(document) = documents.cell_or_text(&uri) else {
                return Ok(None);
            };
            (code, document.path().to_path_buf())
        };

        if self.is_shutting_down().await {
            return Ok(None);
        }
        match self.engine.explain(&path, &code).await {
            Ok(markdown) => Ok(markdown.map(explanation_hover)),
            Err(err) => {
                self.report("Explaining rule", &err).await;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rufflink_core::LifecycleState;
    use tower_lsp::LspService;

    fn python_uri(dir: &std::path::Path, name: &str) -> Url {
        Url::from_file_path(dir.join(name)).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_advertises_capabilities() {
        let (service, _socket) = LspService::new(Backend::new);
        let result = service
            .inner()
            .initialize(InitializeParams::default())
            .await
            .unwrap();

        let caps = result.capabilities;
        assert!(matches!(
            caps.text_document_sync,
            Some(TextDocumentSyncCapability::Options(_))
        ));
        let notebook_sync = &caps.experimental.as_ref().unwrap()["notebookDocumentSync"];
        assert_eq!(notebook_sync["save"], true);
        assert_eq!(
            notebook_sync["notebookSelector"][0]["cells"][0]["language"],
            "python"
        );
        assert_eq!(caps.document_formatting_provider, Some(OneOf::Left(true)));
        assert_eq!(
            caps.hover_provider,
            Some(HoverProviderCapability::Simple(true))
        );
        let commands = caps.execute_command_provider.unwrap().commands;
        assert!(commands.contains(&APPLY_FORMAT.to_string()));
        match caps.code_action_provider {
            Some(CodeActionProviderCapability::Options(options)) => {
                assert_eq!(options.resolve_provider, Some(true));
                let kinds = options.code_action_kinds.unwrap();
                assert!(kinds.contains(&CodeActionKind::SOURCE_ORGANIZE_IMPORTS));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(result.server_info.unwrap().name, "rufflink-lsp");
    }

    #[tokio::test]
    async fn test_resolve_support_detection() {
        let (service, _socket) = LspService::new(Backend::new);
        let params = InitializeParams {
            capabilities: ClientCapabilities {
                text_document: Some(TextDocumentClientCapabilities {
                    code_action: Some(CodeActionClientCapabilities {
                        resolve_support: Some(CodeActionCapabilityResolveSupport {
                            properties: vec!["edit".to_string()],
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        service.inner().initialize(params).await.unwrap();
        assert!(service.inner().resolve_edits.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_close_forgets_document() {
        let (service, _socket) = LspService::new(Backend::new);
        let dir = tempfile::tempdir().unwrap();
        let uri = python_uri(dir.path(), "a.py");
        service
            .inner()
            .documents
            .write()
            .await
            .open_text(uri.clone(), "x = 1\n".into(), 1);

        service
            .inner()
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
        assert!(service.inner().documents.read().await.text(&uri).is_none());
    }

    #[tokio::test]
    async fn test_incremental_change_updates_text() {
        let (service, _socket) = LspService::new(Backend::new);
        let dir = tempfile::tempdir().unwrap();
        let uri = python_uri(dir.path(), "a.py");
        service
            .inner()
            .documents
            .write()
            .await
            .open_text(uri.clone(), "import os\n".into(), 1);

        // `onSave` avoids running the tool for the change itself.
        service
            .inner()
            .did_change_configuration(DidChangeConfigurationParams {
                settings: serde_json::json!({ "settings": { "lint": { "run": "onSave" } } }),
            })
            .await;
        service
            .inner()
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version: 2,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: Some(Range {
                        start: Position { line: 0, character: 7 },
                        end: Position { line: 0, character: 9 },
                    }),
                    range_length: None,
                    text: "sys".into(),
                }],
            })
            .await;

        assert_eq!(
            service.inner().documents.read().await.text(&uri),
            Some("import sys\n")
        );
    }

    #[tokio::test]
    async fn test_hover_outside_noqa_is_none() {
        let (service, _socket) = LspService::new(Backend::new);
        let dir = tempfile::tempdir().unwrap();
        let uri = python_uri(dir.path(), "a.py");
        service
            .inner()
            .documents
            .write()
            .await
            .open_text(uri.clone(), "import os\n".into(), 1);

        let hover = service
            .inner()
            .hover(HoverParams {
                text_document_position_params: TextDocumentPositionParams {
                    text_document: TextDocumentIdentifier { uri },
                    position: Position { line: 0, character: 3 },
                },
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap();
        assert!(hover.is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_follows_requests() {
        let (service, _socket) = LspService::new(Backend::new);
        let backend = service.inner();
        backend.initialize(InitializeParams::default()).await.unwrap();
        assert_eq!(
            backend.lifecycle.read().await.state(),
            LifecycleState::Initialized
        );
        assert!(!backend.is_shutting_down().await);

        backend.shutdown().await.unwrap();
        assert!(backend.is_shutting_down().await);

        let dir = tempfile::tempdir().unwrap();
        let uri = python_uri(dir.path(), "a.py");
        backend
            .documents
            .write()
            .await
            .open_text(uri.clone(), "x = 1\n".into(), 1);
        let edits = backend
            .formatting(DocumentFormattingParams {
                text_document: TextDocumentIdentifier { uri },
                options: FormattingOptions::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap();
        assert!(edits.is_none());
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let (service, _socket) = LspService::new(Backend::new);
        let result = service
            .inner()
            .execute_command(ExecuteCommandParams {
                command: "ruff.unknown".to_string(),
                arguments: vec![],
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await;
        assert!(result.is_err());

        let missing_argument = service
            .inner()
            .execute_command(ExecuteCommandParams {
                command: APPLY_AUTOFIX.to_string(),
                arguments: vec![],
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await;
        assert!(missing_argument.is_err());
    }

    #[tokio::test]
    async fn test_code_action_for_unknown_document() {
        let (service, _socket) = LspService::new(Backend::new);
        let dir = tempfile::tempdir().unwrap();
        let actions = service
            .inner()
            .code_action(CodeActionParams {
                text_document: TextDocumentIdentifier {
                    uri: python_uri(dir.path(), "missing.py"),
                },
                range: Range::default(),
                context: CodeActionContext::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap();
        assert!(actions.is_none());
    }
}
