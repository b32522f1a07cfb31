//! Integration tests for rufflink-lsp.
//!
//! Requests go through the `LspService`, with a client task that answers
//! server requests and records what the server sends. The Unix-only tests
//! replace Ruff with a shell script that answers every invocation with
//! canned output.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rufflink_lsp::Backend;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::{Service, ServiceExt};
use tower_lsp::jsonrpc::{Request, Response};
use tower_lsp::lsp_types::*;
use tower_lsp::LspService;

/// Something the server sent to the client.
#[derive(Debug)]
enum ClientEvent {
    Diagnostics(PublishDiagnosticsParams),
    ApplyEdit(ApplyWorkspaceEditParams),
}

/// A server and the client end of its socket.
///
/// The client side runs on its own task so the server never blocks on a
/// full channel. Edits are always reported as applied.
struct TestClient {
    service: LspService<Backend>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl TestClient {
    fn start() -> Self {
        let (service, socket) = LspService::new(Backend::new);
        let (tx, events) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (mut requests, mut responses) = socket.split();
            while let Some(request) = requests.next().await {
                let params = request.params().cloned().unwrap_or(Value::Null);
                let event = match request.method() {
                    "textDocument/publishDiagnostics" => serde_json::from_value(params)
                        .ok()
                        .map(ClientEvent::Diagnostics),
                    "workspace/applyEdit" => serde_json::from_value(params)
                        .ok()
                        .map(ClientEvent::ApplyEdit),
                    _ => None,
                };
                if let Some(event) = event {
                    let _ = tx.send(event);
                }
                if let Some(id) = request.id().cloned() {
                    let result = if request.method() == "workspace/applyEdit" {
                        json!({ "applied": true })
                    } else {
                        Value::Null
                    };
                    if responses.send(Response::from_ok(id, result)).await.is_err() {
                        break;
                    }
                }
            }
        });
        Self { service, events }
    }

    fn backend(&self) -> &Backend {
        self.service.inner()
    }

    async fn call(&mut self, request: Request) -> Option<Response> {
        self.service.ready().await.unwrap().call(request).await.unwrap()
    }

    async fn initialize(&mut self, options: Value) -> InitializeResult {
        let params = InitializeParams {
            initialization_options: Some(options),
            ..Default::default()
        };
        let request = Request::build("initialize")
            .params(serde_json::to_value(params).unwrap())
            .id(1i64)
            .finish();
        let (_, result) = self.call(request).await.unwrap().into_parts();
        let result = serde_json::from_value(result.unwrap()).unwrap();

        let initialized = Request::build("initialized").params(json!({})).finish();
        assert!(self.call(initialized).await.is_none());
        result
    }

    async fn next_event(&mut self, wait: Duration) -> Option<ClientEvent> {
        tokio::time::timeout(wait, self.events.recv()).await.ok().flatten()
    }

    async fn published(&mut self) -> PublishDiagnosticsParams {
        loop {
            match self.next_event(Duration::from_secs(10)).await {
                Some(ClientEvent::Diagnostics(params)) => return params,
                Some(_) => continue,
                None => panic!("no diagnostics were published"),
            }
        }
    }

    async fn applied(&mut self) -> ApplyWorkspaceEditParams {
        loop {
            match self.next_event(Duration::from_secs(10)).await {
                Some(ClientEvent::ApplyEdit(params)) => return params,
                Some(_) => continue,
                None => panic!("no edit was applied"),
            }
        }
    }

    /// Nothing else arrives within a short grace period.
    async fn quiet(&mut self) -> bool {
        self.next_event(Duration::from_millis(200)).await.is_none()
    }
}

fn code_action_params(
    uri: Url,
    only: Option<Vec<CodeActionKind>>,
    diagnostics: Vec<Diagnostic>,
) -> CodeActionParams {
    CodeActionParams {
        text_document: TextDocumentIdentifier { uri },
        range: Range::default(),
        context: CodeActionContext {
            diagnostics,
            only,
            trigger_kind: None,
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    }
}

fn open_params(uri: Url, text: &str) -> DidOpenTextDocumentParams {
    DidOpenTextDocumentParams {
        text_document: TextDocumentItem {
            uri,
            language_id: "python".to_string(),
            version: 1,
            text: text.to_string(),
        },
    }
}

fn code(diagnostic: &Diagnostic) -> Option<&str> {
    match diagnostic.code.as_ref()? {
        NumberOrString::String(code) => Some(code.as_str()),
        NumberOrString::Number(_) => None,
    }
}

mod lifecycle_tests {
    use super::*;
    use tower_lsp::LanguageServer;

    #[tokio::test]
    async fn test_initialize_with_settings_list() {
        let mut client = TestClient::start();
        let result = client
            .initialize(json!({
                "settings": [{ "workspace": "file:///repo", "lint": { "run": "onSave" } }],
                "globalSettings": { "logLevel": "debug" }
            }))
            .await;
        assert!(result.capabilities.code_action_provider.is_some());

        let shutdown = Request::build("shutdown").id(2i64).finish();
        let response = client.call(shutdown).await.unwrap();
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_initialization_options_are_tolerated() {
        let mut client = TestClient::start();
        let result = client.initialize(json!({ "settings": 42 })).await;
        assert!(result.capabilities.hover_provider.is_some());
    }

    #[tokio::test]
    async fn test_missing_executable_publishes_empty_diagnostics() {
        let mut client = TestClient::start();
        client
            .initialize(json!({
                "settings": { "path": ["/definitely/not/here/ruff"] }
            }))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), "x = 1\n")).await;
        let opened = client.published().await;
        assert_eq!(opened.uri, uri);
        assert!(opened.diagnostics.is_empty());

        client
            .backend()
            .did_save(DidSaveTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                text: None,
            })
            .await;
        assert!(client.published().await.diagnostics.is_empty());

        client
            .backend()
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
        let closed = client.published().await;
        assert_eq!(closed.uri, uri);
        assert!(closed.diagnostics.is_empty());
    }
}

#[cfg(unix)]
mod fake_ruff_tests {
    use super::*;
    use tower_lsp::LanguageServer;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    const SOURCE: &str = "import sys\n\nprint(x)\n";
    const FIXED: &str = "\nprint(x)\n";

    const FINDINGS: &str = r#"[
  {"cell": null, "code": "F401", "message": "`sys` imported but unused",
   "location": {"row": 1, "column": 8}, "end_location": {"row": 1, "column": 11},
   "fix": {"applicability": "safe", "message": "Remove unused import: `sys`",
           "edits": [{"content": "", "location": {"row": 1, "column": 1}, "end_location": {"row": 2, "column": 1}}]},
   "filename": "a.py", "noqa_row": 1, "url": "https://docs.astral.sh/ruff/rules/unused-import"}
]"#;

    const NOTEBOOK_FINDINGS: &str = r#"[
  {"cell": 1, "code": "F401", "message": "`sys` imported but unused",
   "location": {"row": 1, "column": 8}, "end_location": {"row": 1, "column": 11},
   "fix": null, "filename": "nb.ipynb", "noqa_row": 1, "url": null},
  {"cell": 3, "code": "F821", "message": "Undefined name `x`",
   "location": {"row": 1, "column": 7}, "end_location": {"row": 1, "column": 8},
   "fix": null, "filename": "nb.ipynb", "noqa_row": 1, "url": null}
]"#;

    fn fake_ruff(dir: &Path, findings: &str) -> PathBuf {
        let exe = dir.join("ruff");
        let log = dir.join("invocations.log");
        let script = format!(
            r##"#!/bin/sh
if [ "$1" = "--version" ]; then echo "ruff 0.5.0"; exit 0; fi
echo "$*" >> '{log}'
cat > /dev/null
case " $* " in
  *" --explain "*) echo "# unused-import (F401)"; exit 0 ;;
  *" --fix "*|*" format "*) cat <<'RUFF_EOF'
{FIXED}RUFF_EOF
  exit 0 ;;
esac
cat <<'RUFF_EOF'
{findings}
RUFF_EOF
exit 1
"##,
            log = log.display()
        );
        std::fs::write(&exe, script).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        exe
    }

    async fn server_with(dir: &Path, findings: &str) -> TestClient {
        let exe = fake_ruff(dir, findings);
        let mut client = TestClient::start();
        client
            .initialize(json!({
                "settings": { "path": [exe.display().to_string()] }
            }))
            .await;
        client
    }

    async fn server(dir: &Path) -> TestClient {
        server_with(dir, FINDINGS).await
    }

    fn invocations(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("invocations.log")).unwrap_or_default()
    }

    fn actions(response: Option<CodeActionResponse>) -> Vec<CodeAction> {
        response
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match item {
                CodeActionOrCommand::CodeAction(action) => Some(action),
                CodeActionOrCommand::Command(_) => None,
            })
            .collect()
    }

    fn single_edit(edit: &WorkspaceEdit) -> &TextDocumentEdit {
        match edit.document_changes.as_ref().unwrap() {
            DocumentChanges::Edits(edits) => {
                assert_eq!(edits.len(), 1);
                &edits[0]
            }
            DocumentChanges::Operations(_) => panic!("unexpected operations"),
        }
    }

    fn text_edit(edit: &OneOf<TextEdit, AnnotatedTextEdit>) -> &TextEdit {
        match edit {
            OneOf::Left(edit) => edit,
            OneOf::Right(_) => panic!("unexpected annotated edit"),
        }
    }

    #[tokio::test]
    async fn test_open_runs_check_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();

        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let log = invocations(dir.path());
        assert!(log.contains("check --force-exclude"), "{log}");
        assert!(log.contains("--output-format json"), "{log}");

        let published = client.published().await;
        assert_eq!(published.uri, uri);
        assert_eq!(published.version, Some(1));
        assert_eq!(published.diagnostics.len(), 1);
        let diagnostic = &published.diagnostics[0];
        assert_eq!(code(diagnostic), Some("F401"));
        assert_eq!(diagnostic.source.as_deref(), Some("Ruff"));
        assert_eq!(diagnostic.range.start, Position { line: 0, character: 7 });
    }

    #[tokio::test]
    async fn test_notebook_diagnostics_are_published_per_cell() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = server_with(dir.path(), NOTEBOOK_FINDINGS).await;
        let path = dir.path().join("nb.ipynb");
        let notebook = Url::from_file_path(&path).unwrap();
        let cell = |id: &str| {
            Url::parse(&format!("vscode-notebook-cell:{}#{id}", path.display())).unwrap()
        };

        let params: rufflink_lsp::DidOpenNotebookParams = serde_json::from_value(json!({
            "notebookDocument": {
                "uri": notebook,
                "notebookType": "jupyter-notebook",
                "version": 0,
                "cells": [
                    { "kind": 2, "document": cell("c1") },
                    { "kind": 1, "document": cell("m2") },
                    { "kind": 2, "document": cell("c3") }
                ]
            },
            "cellTextDocuments": [
                { "uri": cell("c1"), "languageId": "python", "version": 1, "text": "import sys" },
                { "uri": cell("m2"), "languageId": "markdown", "version": 1, "text": "# Notes" },
                { "uri": cell("c3"), "languageId": "python", "version": 1, "text": "print(x)" }
            ]
        }))
        .unwrap();
        client.backend().did_open_notebook(params).await;

        let first = client.published().await;
        assert_eq!(first.uri, cell("c1"));
        assert_eq!(first.diagnostics.len(), 1);
        assert_eq!(code(&first.diagnostics[0]), Some("F401"));

        let second = client.published().await;
        assert_eq!(second.uri, cell("c3"));
        assert_eq!(second.diagnostics.len(), 1);
        assert_eq!(code(&second.diagnostics[0]), Some("F821"));
        assert_eq!(second.diagnostics[0].range.start, Position { line: 0, character: 6 });

        // The markup cell gets nothing.
        assert!(client.quiet().await);

        let close: rufflink_lsp::DidCloseNotebookParams = serde_json::from_value(json!({
            "notebookDocument": { "uri": notebook },
            "cellTextDocuments": [{ "uri": cell("c1") }, { "uri": cell("m2") }, { "uri": cell("c3") }]
        }))
        .unwrap();
        client.backend().did_close_notebook(close).await;
        let mut cleared = Vec::new();
        for _ in 0..3 {
            let published = client.published().await;
            assert!(published.diagnostics.is_empty());
            cleared.push(published.uri);
        }
        assert!(cleared.contains(&cell("c1")));
        assert!(cleared.contains(&cell("c3")));
    }

    #[tokio::test]
    async fn test_exclusive_organize_imports() {
        let dir = tempfile::tempdir().unwrap();
        let client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let response = client
            .backend()
            .code_action(code_action_params(
                uri.clone(),
                Some(vec![CodeActionKind::new("source.organizeImports.ruff")]),
                vec![],
            ))
            .await
            .unwrap();
        let actions = actions(response);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].title, "Ruff: Organize Imports");
        assert_eq!(
            actions[0].kind,
            Some(CodeActionKind::new("source.organizeImports.ruff"))
        );

        let edit = single_edit(actions[0].edit.as_ref().unwrap());
        assert_eq!(edit.text_document.uri, uri);
        assert_eq!(edit.text_document.version, Some(1));
        assert!(invocations(dir.path()).contains("--select I001"));
    }

    #[tokio::test]
    async fn test_quick_fixes_from_diagnostic_data() {
        let dir = tempfile::tempdir().unwrap();
        let client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let diagnostic: Diagnostic = serde_json::from_value(json!({
            "range": { "start": { "line": 0, "character": 7 }, "end": { "line": 0, "character": 10 } },
            "message": "`sys` imported but unused",
            "code": "F401",
            "source": "Ruff",
            "data": {
                "fix": {
                    "applicability": "safe",
                    "message": "Remove unused import: `sys`",
                    "edits": [{ "content": "", "location": { "row": 1, "column": 0 }, "end_location": { "row": 2, "column": 0 } }]
                },
                "noqa_row": 1
            }
        }))
        .unwrap();
        let foreign = Diagnostic {
            source: Some("pyright".to_string()),
            ..diagnostic.clone()
        };

        let response = client
            .backend()
            .code_action(code_action_params(
                uri,
                Some(vec![CodeActionKind::QUICKFIX]),
                vec![diagnostic, foreign],
            ))
            .await
            .unwrap();
        let actions = actions(response);
        let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Ruff (F401): Remove unused import: `sys`",
                "Ruff (F401): Disable for this line",
            ]
        );

        let suppression = single_edit(actions[1].edit.as_ref().unwrap());
        let edit = text_edit(&suppression.edits[0]);
        assert_eq!(edit.new_text, "import sys  # noqa: F401");
        assert_eq!(edit.range.start, Position { line: 0, character: 0 });
        assert_eq!(edit.range.end, Position { line: 0, character: 10 });
    }

    #[tokio::test]
    async fn test_library_files_have_no_actions() {
        let dir = tempfile::tempdir().unwrap();
        let client = server(dir.path()).await;
        let library = dir.path().join("lib/python3.11/site-packages/pkg");
        std::fs::create_dir_all(&library).unwrap();
        let uri = Url::from_file_path(library.join("mod.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let response = client
            .backend()
            .code_action(code_action_params(uri, None, vec![]))
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_formatting_returns_minimal_edits() {
        let dir = tempfile::tempdir().unwrap();
        let client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let edits = client
            .backend()
            .formatting(DocumentFormattingParams {
                text_document: TextDocumentIdentifier { uri },
                options: FormattingOptions::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start, Position { line: 0, character: 0 });
        assert_eq!(edits[0].range.end, Position { line: 1, character: 0 });
        assert_eq!(edits[0].new_text, "");
        assert!(invocations(dir.path()).contains("format --force-exclude"));
    }

    #[tokio::test]
    async fn test_hover_explains_noqa_code() {
        let dir = tempfile::tempdir().unwrap();
        let client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client
            .backend()
            .did_open(open_params(uri.clone(), "import sys  # noqa: F401\n"))
            .await;

        let hover = client
            .backend()
            .hover(HoverParams {
                text_document_position_params: TextDocumentPositionParams {
                    text_document: TextDocumentIdentifier { uri },
                    position: Position { line: 0, character: 21 },
                },
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        match hover.contents {
            HoverContents::Markup(markup) => assert_eq!(markup.value, "# unused-import (F401)"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(invocations(dir.path()).contains("--explain F401"));
    }

    #[tokio::test]
    async fn test_apply_autofix_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = server(dir.path()).await;
        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;

        let result = client
            .backend()
            .execute_command(ExecuteCommandParams {
                command: rufflink_lsp::APPLY_AUTOFIX.to_string(),
                arguments: vec![json!({ "uri": uri, "version": 1 })],
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(invocations(dir.path()).contains("--fix"));

        let applied = client.applied().await;
        let edit = single_edit(&applied.edit);
        assert_eq!(edit.text_document.uri, uri);
        let removal = text_edit(&edit.edits[0]);
        assert_eq!(removal.range.start, Position { line: 0, character: 0 });
        assert_eq!(removal.range.end, Position { line: 1, character: 0 });
        assert_eq!(removal.new_text, "");
    }

    #[tokio::test]
    async fn test_no_tool_runs_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = server(dir.path()).await;
        let shutdown = Request::build("shutdown").id(2i64).finish();
        assert!(client.call(shutdown).await.unwrap().is_ok());

        let uri = Url::from_file_path(dir.path().join("a.py")).unwrap();
        client.backend().did_open(open_params(uri.clone(), SOURCE)).await;
        let edits = client
            .backend()
            .formatting(DocumentFormattingParams {
                text_document: TextDocumentIdentifier { uri },
                options: FormattingOptions::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap();

        assert!(edits.is_none());
        assert_eq!(invocations(dir.path()), "");
        assert!(client.quiet().await);
    }
}
