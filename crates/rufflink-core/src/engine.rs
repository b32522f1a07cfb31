//! The operations the LSP layer calls: lint, fix, format and explain.
//!
//! Each operation resolves settings for the document, skips library files,
//! locates the executable, checks its capabilities, runs it and interprets
//! the output. `Ok(None)` means the operation was skipped on purpose.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::args;
use crate::diagnostics::{Diagnostic, Range};
use crate::document::{CellKind, Document, DocumentKind, NotebookJson};
use crate::edits::{reconcile, reconcile_cell, DocumentEdit};
use crate::error::{EngineError, EngineResult};
use crate::locator::ExecutableLocator;
use crate::output::parse_findings;
use crate::process::{ProcessInvoker, RunResult};
use crate::settings::{LogLevel, SettingsRegistry, UserSettings, WorkspaceSettings};
use crate::stdlib::is_library_path;
use crate::version::{Capabilities, CapabilityCache, Operation};

pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Rule code of the import sorter, used for organize-imports.
pub const ORGANIZE_IMPORTS_RULE: &str = "I001";

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on concurrently running subprocesses.
    pub max_workers: usize,
    /// Executable shipped alongside the editor extension.
    pub bundle: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            bundle: None,
        }
    }
}

/// One mutex per document path, so runs on the same file never overlap.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentLocks {
    const PRUNE_THRESHOLD: usize = 256;

    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > Self::PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Debug)]
pub struct Engine {
    settings: RwLock<SettingsRegistry>,
    locator: ExecutableLocator,
    capabilities: CapabilityCache,
    invoker: ProcessInvoker,
    locks: DocumentLocks,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let locator = ExecutableLocator::new(options.bundle.clone());
        Self::with_locator(options, locator)
    }

    pub fn with_locator(options: EngineOptions, locator: ExecutableLocator) -> Self {
        Self {
            settings: RwLock::new(SettingsRegistry::new()),
            locator,
            capabilities: CapabilityCache::new(),
            invoker: ProcessInvoker::new(options.max_workers),
            locks: DocumentLocks::default(),
        }
    }

    /// Replace the global settings (when given) and all workspace entries.
    pub async fn configure(
        &self,
        global: Option<UserSettings>,
        workspaces: &[UserSettings],
        cwd: &Path,
    ) {
        let mut registry = self.settings.write().await;
        if let Some(global) = global {
            registry.set_global(global);
        }
        registry.register_all(workspaces, cwd);
        let roots: Vec<String> = registry
            .workspace_roots()
            .map(|root| root.display().to_string())
            .collect();
        tracing::info!(?roots, "Workspace settings updated");
    }

    pub async fn settings_for(&self, path: &Path) -> Arc<WorkspaceSettings> {
        self.settings.read().await.resolve(path)
    }

    pub async fn log_level(&self) -> LogLevel {
        self.settings.read().await.log_level()
    }

    /// Library files are left alone when `ignoreStandardLibrary` is set.
    pub async fn is_skipped(&self, path: &Path, settings: &WorkspaceSettings) -> bool {
        if !settings.ignore_standard_library {
            return false;
        }
        let resolved = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        let skipped = is_library_path(&resolved, &self.locator.library_paths(settings).await);
        if skipped {
            tracing::info!(path = %path.display(), "Skipping standard library file");
        }
        skipped
    }

    pub async fn lint(&self, document: &Document) -> EngineResult<Option<Vec<Diagnostic>>> {
        let settings = self.settings_for(document.path()).await;
        if !settings.lint.enable {
            return Ok(Some(Vec::new()));
        }
        if self.is_skipped(document.path(), &settings).await {
            return Ok(None);
        }
        let (program, caps) = self.executable(&settings, Operation::Lint).await?;
        if !Self::accepts(&caps, document) {
            return Ok(None);
        }

        let argv = args::check_args(&caps, &settings.lint.args, &[], None, document.path());
        let result = self.run(&program, &argv, &settings, document).await?;
        check_lint_exit(&result)?;
        Ok(Some(parse_findings(
            &result.stdout,
            &caps,
            settings.show_syntax_errors,
        )?))
    }

    /// Apply all fixes, or only those of rule `only`.
    pub async fn fix(
        &self,
        document: &Document,
        only: Option<&str>,
    ) -> EngineResult<Option<Vec<DocumentEdit>>> {
        let settings = self.settings_for(document.path()).await;
        if self.is_skipped(document.path(), &settings).await {
            return Ok(None);
        }
        let operation = if only.is_some() {
            Operation::OrganizeImports
        } else {
            Operation::Fix
        };
        let (program, caps) = self.executable(&settings, operation).await?;
        if !Self::accepts(&caps, document) {
            return Ok(None);
        }

        let argv = args::check_args(&caps, &settings.lint.args, &["--fix"], only, document.path());
        let result = self.run(&program, &argv, &settings, document).await?;
        check_lint_exit(&result)?;
        result_to_edits(document, &result)
    }

    pub async fn organize_imports(
        &self,
        document: &Document,
    ) -> EngineResult<Option<Vec<DocumentEdit>>> {
        self.fix(document, Some(ORGANIZE_IMPORTS_RULE)).await
    }

    /// Format the whole document, or only `range` of a text document.
    pub async fn format(
        &self,
        document: &Document,
        range: Option<Range>,
    ) -> EngineResult<Option<Vec<DocumentEdit>>> {
        let settings = self.settings_for(document.path()).await;
        if self.is_skipped(document.path(), &settings).await {
            return Ok(None);
        }
        let operation = if range.is_some() {
            Operation::RangeFormat
        } else {
            Operation::Format
        };
        let (program, caps) = self.executable(&settings, operation).await?;
        if range.is_some() && document.kind() != DocumentKind::Text {
            tracing::info!(uri = %document.uri(), "Range formatting is only supported for text documents");
            return Ok(None);
        }
        if !Self::accepts(&caps, document) {
            return Ok(None);
        }

        let argv = args::format_args(&settings.format_args, document.path(), range);
        let result = self.run(&program, &argv, &settings, document).await?;
        if result.exit_code != 0 {
            return Err(EngineError::ToolFailure {
                code: result.exit_code,
                stderr: result.stderr_text(),
            });
        }
        result_to_edits(document, &result)
    }

    /// Markdown documentation for a rule.
    pub async fn explain(&self, path: &Path, code: &str) -> EngineResult<Option<String>> {
        let settings = self.settings_for(path).await;
        let (program, _) = self.executable(&settings, Operation::Explain).await?;
        let result = self
            .invoker
            .run(&program, &args::explain_args(code), settings.cwd.as_deref(), "")
            .await?;
        if result.exit_code != 0 {
            tracing::info!(%code, stderr = %result.stderr_text(), "No explanation available");
            return Ok(None);
        }
        let text = result.stdout_text();
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    async fn executable(
        &self,
        settings: &WorkspaceSettings,
        operation: Operation,
    ) -> EngineResult<(PathBuf, Arc<Capabilities>)> {
        let program = self.locator.locate(settings).await;
        let version = self.locator.version(&program, &self.invoker).await?;
        let caps = self.capabilities.get(&version);
        caps.require(operation, &program)?;
        tracing::debug!(%version, path = %program.display(), %operation, "Found Ruff");
        Ok((program, caps))
    }

    fn accepts(caps: &Capabilities, document: &Document) -> bool {
        if document.kind() != DocumentKind::Text && !caps.cell_attribution {
            tracing::warn!(
                version = %caps.version,
                "Notebooks require Ruff 0.1.0 or newer"
            );
            return false;
        }
        true
    }

    async fn run(
        &self,
        program: &Path,
        argv: &[String],
        settings: &WorkspaceSettings,
        document: &Document,
    ) -> EngineResult<RunResult> {
        let input = document.tool_input()?;
        let _guard = self.locks.acquire(document.path()).await;
        self.invoker
            .run(program, argv, settings.cwd.as_deref(), &input)
            .await
    }
}

/// `check` exits with 0 (clean) or 1 (findings); anything else is an internal error.
fn check_lint_exit(result: &RunResult) -> EngineResult<()> {
    if matches!(result.exit_code, 0 | 1) {
        Ok(())
    } else {
        Err(EngineError::ToolFailure {
            code: result.exit_code,
            stderr: result.stderr_text(),
        })
    }
}

/// Turn rewritten tool output into per-document edits.
///
/// Empty output for a non-blank document means the file was excluded.
fn result_to_edits(
    document: &Document,
    result: &RunResult,
) -> EngineResult<Option<Vec<DocumentEdit>>> {
    if result.stdout.is_empty() && !document.is_blank() {
        return Ok(None);
    }
    let output = result.stdout_text();

    match document {
        Document::Text {
            uri,
            source,
            version,
            ..
        } => Ok(Some(vec![DocumentEdit {
            uri: uri.clone(),
            version: *version,
            edits: reconcile(source, &output),
        }])),
        Document::Notebook { cells, .. } => {
            let notebook = NotebookJson::parse(&output)?;
            if notebook.cells.len() != cells.len() {
                return Err(EngineError::MalformedOutput {
                    reason: format!(
                        "notebook has {} cells but Ruff returned {}",
                        cells.len(),
                        notebook.cells.len()
                    ),
                });
            }
            Ok(Some(
                cells
                    .iter()
                    .zip(notebook.cells)
                    .filter(|(cell, _)| cell.kind == CellKind::Code)
                    .map(|(cell, fixed)| DocumentEdit {
                        uri: cell.uri.clone(),
                        version: cell.version,
                        edits: reconcile(&cell.source, &fixed.into_source()),
                    })
                    .collect(),
            ))
        }
        Document::Cell { cell, .. } => {
            let notebook = NotebookJson::parse(&output)?;
            match notebook.cells.into_iter().next() {
                Some(fixed) if fixed.is_code() => Ok(Some(vec![DocumentEdit {
                    uri: cell.uri.clone(),
                    version: cell.version,
                    edits: reconcile_cell(&cell.source, &fixed.into_source()),
                }])),
                _ => Err(EngineError::MalformedOutput {
                    reason: "expected a single code cell".to_string(),
                }),
            }
        }
    }
}
