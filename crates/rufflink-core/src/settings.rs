//! Layered settings.
//!
//! Three layers, later ones win per top-level key:
//! built-in defaults, the global user settings, and per-workspace overrides.
//! Resolved [`WorkspaceSettings`] are immutable snapshots shared through `Arc`,
//! so in-flight operations keep the values they started with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// When linting runs for plain text documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Run {
    #[default]
    OnType,
    OnSave,
}

/// Where to look for the executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStrategy {
    #[default]
    FromEnvironment,
    UseBundled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintOptions {
    pub enable: Option<bool>,
    pub args: Option<Vec<String>>,
    pub run: Option<Run>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Toggle {
    pub enable: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeActionOptions {
    pub fix_violation: Option<Toggle>,
    pub disable_rule_comment: Option<Toggle>,
}

/// Settings as received from the client. Every field is optional so that a
/// layer only overrides what it names.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub log_level: Option<LogLevel>,
    pub path: Option<Vec<String>>,
    pub interpreter: Option<Vec<String>>,
    pub import_strategy: Option<ImportStrategy>,
    pub organize_imports: Option<bool>,
    pub fix_all: Option<bool>,
    pub ignore_standard_library: Option<bool>,
    pub show_syntax_errors: Option<bool>,
    pub lint: Option<LintOptions>,
    pub format: Option<FormatOptions>,
    pub code_action: Option<CodeActionOptions>,
    /// Deprecated alias for `lint.args`.
    pub args: Option<Vec<String>>,
    /// Deprecated alias for `lint.run`.
    pub run: Option<Run>,
    /// Workspace folder URI these settings belong to.
    pub workspace: Option<String>,
}

impl UserSettings {
    pub fn is_empty(&self) -> bool {
        *self == UserSettings::default()
    }

    /// Shallow merge: every top-level key present in `over` replaces ours.
    pub fn merged_with(&self, over: &UserSettings) -> UserSettings {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        UserSettings {
            log_level: over.log_level.or(self.log_level),
            path: pick(&self.path, &over.path),
            interpreter: pick(&self.interpreter, &over.interpreter),
            import_strategy: over.import_strategy.or(self.import_strategy),
            organize_imports: over.organize_imports.or(self.organize_imports),
            fix_all: over.fix_all.or(self.fix_all),
            ignore_standard_library: over.ignore_standard_library.or(self.ignore_standard_library),
            show_syntax_errors: over.show_syntax_errors.or(self.show_syntax_errors),
            lint: pick(&self.lint, &over.lint),
            format: pick(&self.format, &over.format),
            code_action: pick(&self.code_action, &over.code_action),
            args: pick(&self.args, &over.args),
            run: over.run.or(self.run),
            workspace: pick(&self.workspace, &over.workspace),
        }
    }

    /// Filesystem path named by the `workspace` URI, if any.
    pub fn workspace_path(&self) -> Option<PathBuf> {
        let uri = self.workspace.as_deref()?;
        match Url::parse(uri) {
            Ok(url) => url.to_file_path().ok(),
            Err(_) => Some(PathBuf::from(uri)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSettings {
    pub enable: bool,
    pub args: Vec<String>,
    pub run: Run,
}

/// Fully resolved settings for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    pub workspace_path: PathBuf,
    /// Working directory for subprocesses. `None` for files outside any workspace.
    pub cwd: Option<PathBuf>,
    pub log_level: LogLevel,
    pub path: Vec<String>,
    pub interpreter: Vec<String>,
    pub import_strategy: ImportStrategy,
    pub organize_imports: bool,
    pub fix_all: bool,
    pub ignore_standard_library: bool,
    pub show_syntax_errors: bool,
    pub lint: LintSettings,
    pub format_args: Vec<String>,
    pub fix_violation: bool,
    pub disable_rule_comment: bool,
}

impl WorkspaceSettings {
    /// Fill every missing key of `layered` with the built-in default.
    pub fn resolve(layered: &UserSettings, workspace_path: PathBuf, cwd: Option<PathBuf>) -> Self {
        let lint = layered.lint.clone().unwrap_or_default();
        let code_action = layered.code_action.clone().unwrap_or_default();
        let enabled = |toggle: Option<Toggle>| toggle.and_then(|t| t.enable).unwrap_or(true);
        Self {
            workspace_path,
            cwd,
            log_level: layered.log_level.unwrap_or_default(),
            path: layered.path.clone().unwrap_or_default(),
            interpreter: layered.interpreter.clone().unwrap_or_default(),
            import_strategy: layered.import_strategy.unwrap_or_default(),
            organize_imports: layered.organize_imports.unwrap_or(true),
            fix_all: layered.fix_all.unwrap_or(true),
            ignore_standard_library: layered.ignore_standard_library.unwrap_or(true),
            show_syntax_errors: layered.show_syntax_errors.unwrap_or(true),
            lint: LintSettings {
                enable: lint.enable.unwrap_or(true),
                args: lint
                    .args
                    .or_else(|| layered.args.clone())
                    .unwrap_or_default(),
                run: lint.run.or(layered.run).unwrap_or_default(),
            },
            format_args: layered
                .format
                .as_ref()
                .and_then(|f| f.args.clone())
                .unwrap_or_default(),
            fix_violation: enabled(code_action.fix_violation),
            disable_rule_comment: enabled(code_action.disable_rule_comment),
        }
    }

    /// Defaults for a file that belongs to no workspace.
    pub fn for_orphan(global: &UserSettings, document_path: &Path) -> Self {
        let parent = document_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| document_path.to_path_buf());
        Self::resolve(global, parent, None)
    }
}

/// Global settings plus the resolved settings of every known workspace.
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    global: UserSettings,
    workspaces: HashMap<PathBuf, Arc<WorkspaceSettings>>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &UserSettings {
        &self.global
    }

    pub fn set_global(&mut self, global: UserSettings) {
        self.global = global;
    }

    /// Register one workspace. Its subprocess working directory is the
    /// workspace root.
    pub fn register(&mut self, root: PathBuf, overrides: &UserSettings) -> Arc<WorkspaceSettings> {
        let layered = self.global.merged_with(overrides);
        let settings = Arc::new(WorkspaceSettings::resolve(
            &layered,
            root.clone(),
            Some(root.clone()),
        ));
        self.workspaces.insert(root, Arc::clone(&settings));
        settings
    }

    /// Replace all workspace entries. Entries without a `workspace` URI, and an
    /// empty list, register `cwd` as the workspace.
    pub fn register_all(&mut self, entries: &[UserSettings], cwd: &Path) {
        self.workspaces.clear();
        if entries.is_empty() {
            self.register(cwd.to_path_buf(), &UserSettings::default());
            return;
        }
        for entry in entries {
            let root = entry.workspace_path().unwrap_or_else(|| cwd.to_path_buf());
            self.register(root, entry);
        }
    }

    /// Settings for the nearest registered ancestor of `document_path`, or
    /// orphan defaults when there is none.
    pub fn resolve(&self, document_path: &Path) -> Arc<WorkspaceSettings> {
        document_path
            .ancestors()
            .find_map(|dir| self.workspaces.get(dir))
            .map(Arc::clone)
            .unwrap_or_else(|| {
                Arc::new(WorkspaceSettings::for_orphan(&self.global, document_path))
            })
    }

    pub fn workspace_roots(&self) -> impl Iterator<Item = &Path> {
        self.workspaces.keys().map(PathBuf::as_path)
    }

    /// The most verbose log level any layer asks for.
    pub fn log_level(&self) -> LogLevel {
        self.workspaces
            .values()
            .map(|ws| ws.log_level)
            .chain(self.global.log_level)
            .max()
            .unwrap_or_default()
    }
}
