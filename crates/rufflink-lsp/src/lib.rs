//! # rufflink-lsp
//!
//! Language Server Protocol front-end for the Ruff linter and formatter.
//!
//! ## Features
//!
//! - Diagnostics on open, change and save, for Python files and notebooks
//! - Quick fixes and `# noqa` suppression actions
//! - Fix All and Organize Imports source actions
//! - Document and range formatting
//! - Rule documentation on hover over `# noqa` codes
//!
//! ## Usage
//!
//! ```bash
//! rufflink-lsp --max-workers 5
//! ```
//!
//! The server communicates over stdin/stdout using the LSP protocol.

mod backend;
mod code_actions;
mod diagnostic_mapper;
mod hover_provider;
mod init_options;
pub mod logging;
mod notebook;
mod position;

pub use backend::{Backend, APPLY_AUTOFIX, APPLY_FORMAT, APPLY_ORGANIZE_IMPORTS};
pub use init_options::{InitializationOptions, SettingsPayload};
pub use notebook::{
    DidChangeNotebookParams, DidCloseNotebookParams, DidOpenNotebookParams, DidSaveNotebookParams,
};

use logging::LogHandle;
use rufflink_core::EngineOptions;
use tower_lsp::{LspService, Server};

/// Start the LSP server.
///
/// Runs over stdin/stdout until the client shuts the server down. At most
/// `options.max_workers` requests are handled concurrently.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn start_server(options: EngineOptions, log: Option<LogHandle>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let concurrency = options.max_workers.max(1);

    let (service, socket) =
        LspService::build(|client| Backend::with_options(client, options, log))
            .custom_method("notebookDocument/didOpen", Backend::did_open_notebook)
            .custom_method("notebookDocument/didChange", Backend::did_change_notebook)
            .custom_method("notebookDocument/didSave", Backend::did_save_notebook)
            .custom_method("notebookDocument/didClose", Backend::did_close_notebook)
            .finish();

    tracing::info!(concurrency, "Starting rufflink-lsp");
    Server::new(stdin, stdout, socket)
        .concurrency_level(concurrency)
        .serve(service)
        .await;
    Ok(())
}
