//! Finding the executable and identifying its version.
//!
//! Search order, first existing candidate wins:
//!
//! 1. the `path` setting, after `$VAR` and `~` expansion
//! 2. the bundled executable when `importStrategy` is `useBundled`
//! 3. the scripts directory of a configured interpreter
//! 4. the directory this server was installed into
//! 5. `PATH`
//! 6. the bundled executable
//!
//! When nothing exists the candidate from step 4 is returned anyway and the
//! failure surfaces when it is run.

use regex::{Captures, Regex};
use semver::Version;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tokio::process::Command;

use crate::error::{EngineError, EngineResult};
use crate::process::ProcessInvoker;
use crate::regex_util::static_regex;
use crate::settings::{ImportStrategy, WorkspaceSettings};
use crate::version::parse_version;

static_regex!(fn env_var, r"\$\{(\w+)\}|\$(\w+)|%(\w+)%");

/// Python snippet printing an interpreter's scripts and library directories.
const PROBE_SCRIPT: &str = "import json, site, sysconfig; p = sysconfig.get_paths(); \
print(json.dumps({'scripts': p['scripts'], 'library': \
[v for k, v in p.items() if k not in ('data', 'platdata', 'scripts')] + \
list(getattr(site, 'getsitepackages', list)())}))";

pub fn executable_name() -> &'static str {
    if cfg!(windows) {
        "ruff.exe"
    } else {
        "ruff"
    }
}

/// Expand `$VAR`, `${VAR}` (and `%VAR%` on Windows) plus a leading `~`.
/// Unknown variables are left as written.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = env_var().replace_all(raw, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        if caps.get(3).is_some() && !cfg!(windows) {
            return whole.to_string();
        }
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| whole.to_string())
    });

    if let Some(rest) = expanded.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest.trim_start_matches(['/', '\\']));
            }
        }
    }
    PathBuf::from(expanded.into_owned())
}

/// What a probed interpreter reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterpreterInfo {
    pub scripts: PathBuf,
    #[serde(default)]
    pub library: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct VersionStamp {
    version: Version,
    modified: Option<SystemTime>,
}

/// Locates the executable and caches per-path versions and per-interpreter
/// probes for the life of the process.
#[derive(Debug)]
pub struct ExecutableLocator {
    bundle: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    interpreters: RwLock<HashMap<String, Option<Arc<InterpreterInfo>>>>,
    versions: RwLock<HashMap<PathBuf, VersionStamp>>,
}

impl ExecutableLocator {
    pub fn new(bundle: Option<PathBuf>) -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::with_install_dir(bundle, install_dir)
    }

    /// Use `install_dir` instead of the running executable's directory.
    pub fn with_install_dir(bundle: Option<PathBuf>, install_dir: Option<PathBuf>) -> Self {
        Self {
            bundle,
            install_dir,
            interpreters: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
        }
    }

    pub fn bundle(&self) -> Option<&Path> {
        self.bundle.as_deref()
    }

    pub async fn locate(&self, settings: &WorkspaceSettings) -> PathBuf {
        if !settings.path.is_empty() {
            for raw in &settings.path {
                let candidate = expand_path(raw);
                if exists(&candidate).await {
                    tracing::info!(path = %candidate.display(), "Using 'path' setting");
                    return candidate;
                }
            }
            tracing::info!(paths = ?settings.path, "Could not find executable in 'path'");
        }

        if settings.import_strategy == ImportStrategy::UseBundled {
            if let Some(bundle) = &self.bundle {
                tracing::info!(path = %bundle.display(), "Using bundled executable");
                return bundle.clone();
            }
        }

        if let Some(interpreter) = settings.interpreter.first() {
            match self.interpreter_info(interpreter).await {
                Some(info) => {
                    let candidate = info.scripts.join(executable_name());
                    if exists(&candidate).await {
                        tracing::info!(path = %candidate.display(), "Using interpreter executable");
                        return candidate;
                    }
                    tracing::info!(path = %candidate.display(), "Interpreter executable not found");
                }
                None => tracing::info!(%interpreter, "Could not inspect interpreter"),
            }
        }

        let best_guess = self
            .install_dir
            .as_ref()
            .map(|dir| dir.join(executable_name()));
        if let Some(candidate) = &best_guess {
            if exists(candidate).await {
                tracing::info!(path = %candidate.display(), "Using executable next to the server");
                return candidate.clone();
            }
            tracing::info!(path = %candidate.display(), "Executable next to the server not found");
        }

        if let Ok(found) = which::which("ruff") {
            tracing::info!(path = %found.display(), "Using environment executable");
            return found;
        }

        if let Some(bundle) = &self.bundle {
            tracing::info!(path = %bundle.display(), "Falling back to bundled executable");
            return bundle.clone();
        }

        let fallback = best_guess.unwrap_or_else(|| PathBuf::from(executable_name()));
        tracing::info!(path = %fallback.display(), "Unable to find executable");
        fallback
    }

    /// Version of the executable at `path`, re-read when its modification
    /// time changes. The probe counts against `invoker`'s worker limit.
    pub async fn version(&self, path: &Path, invoker: &ProcessInvoker) -> EngineResult<Version> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| EngineError::ExecutableMissing {
                path: path.to_path_buf(),
                source,
            })?;
        let modified = metadata.modified().ok();

        if let Some(stamp) = self
            .versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            if stamp.modified == modified {
                return Ok(stamp.version.clone());
            }
        }

        let output = invoker
            .run(path, &["--version".to_string()], None, "")
            .await?;
        let text = output.stdout_text();
        let version = parse_version(&text).ok_or_else(|| EngineError::InvalidVersion {
            path: path.to_path_buf(),
            output: text.trim().to_string(),
        })?;
        tracing::info!(%version, path = %path.display(), "Inferred Ruff version");

        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.to_path_buf(),
                VersionStamp {
                    version: version.clone(),
                    modified,
                },
            );
        Ok(version)
    }

    /// Library directories of the configured interpreter, or of the first
    /// `python3`/`python` on `PATH`.
    pub async fn library_paths(&self, settings: &WorkspaceSettings) -> Vec<PathBuf> {
        let interpreter = match settings.interpreter.first() {
            Some(interpreter) => interpreter.clone(),
            None => match which::which("python3").or_else(|_| which::which("python")) {
                Ok(found) => found.display().to_string(),
                Err(_) => return Vec::new(),
            },
        };
        self.interpreter_info(&interpreter)
            .await
            .map(|info| info.library.clone())
            .unwrap_or_default()
    }

    async fn interpreter_info(&self, interpreter: &str) -> Option<Arc<InterpreterInfo>> {
        if let Some(cached) = self
            .interpreters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interpreter)
        {
            return cached.clone();
        }

        let info = probe_interpreter(&expand_path(interpreter)).await.map(Arc::new);
        self.interpreters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interpreter.to_string(), info.clone());
        info
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn probe_interpreter(interpreter: &Path) -> Option<InterpreterInfo> {
    let output = Command::new(interpreter)
        .arg("-c")
        .arg(PROBE_SCRIPT)
        .kill_on_drop(true)
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            match serde_json::from_slice::<InterpreterInfo>(&output.stdout) {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!(interpreter = %interpreter.display(), error = %err, "Unexpected interpreter probe output");
                    None
                }
            }
        }
        Ok(output) => {
            tracing::warn!(
                interpreter = %interpreter.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Interpreter probe failed"
            );
            None
        }
        Err(err) => {
            tracing::warn!(interpreter = %interpreter.display(), error = %err, "Failed to run interpreter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::UserSettings;

    fn settings(json: serde_json::Value) -> WorkspaceSettings {
        let user: UserSettings = serde_json::from_value(json).unwrap();
        WorkspaceSettings::resolve(&user, PathBuf::from("/w"), None)
    }

    #[test]
    fn test_expand_env_and_home() {
        std::env::set_var("RUFFLINK_TEST_DIR", "/opt/tools");
        assert_eq!(expand_path("$RUFFLINK_TEST_DIR/ruff"), PathBuf::from("/opt/tools/ruff"));
        assert_eq!(expand_path("${RUFFLINK_TEST_DIR}/ruff"), PathBuf::from("/opt/tools/ruff"));
        assert_eq!(
            expand_path("$RUFFLINK_TEST_UNSET_VAR/ruff"),
            PathBuf::from("$RUFFLINK_TEST_UNSET_VAR/ruff")
        );
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/bin/ruff"), home.join("bin/ruff"));
        }
        assert_eq!(expand_path("~user/ruff"), PathBuf::from("~user/ruff"));
    }

    #[tokio::test]
    async fn test_path_setting_wins() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("my-ruff");
        std::fs::write(&exe, "").unwrap();
        let locator = ExecutableLocator::with_install_dir(Some(PathBuf::from("/bundle/ruff")), None);
        let s = settings(serde_json::json!({
            "path": ["/does/not/exist/ruff", exe.display().to_string()],
            "importStrategy": "useBundled"
        }));
        assert_eq!(locator.locate(&s).await, exe);
    }

    #[tokio::test]
    async fn test_use_bundled_strategy() {
        let locator = ExecutableLocator::with_install_dir(Some(PathBuf::from("/bundle/ruff")), None);
        let s = settings(serde_json::json!({ "importStrategy": "useBundled" }));
        assert_eq!(locator.locate(&s).await, PathBuf::from("/bundle/ruff"));
    }

    #[tokio::test]
    async fn test_install_dir_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(executable_name());
        std::fs::write(&exe, "").unwrap();
        let locator = ExecutableLocator::with_install_dir(None, Some(dir.path().to_path_buf()));
        assert_eq!(locator.locate(&settings(serde_json::json!({}))).await, exe);
    }

    #[tokio::test]
    async fn test_missing_interpreter_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(executable_name());
        std::fs::write(&exe, "").unwrap();
        let locator = ExecutableLocator::with_install_dir(None, Some(dir.path().to_path_buf()));
        let s = settings(serde_json::json!({ "interpreter": ["/no/such/python"] }));
        assert_eq!(locator.locate(&s).await, exe);
    }

    #[tokio::test]
    async fn test_version_of_missing_executable() {
        let locator = ExecutableLocator::with_install_dir(None, None);
        let err = locator.version(Path::new("/no/such/ruff"), &ProcessInvoker::new(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::ExecutableMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_is_cached_until_modified() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ruff");
        let write_script = |version: &str| {
            std::fs::write(&exe, format!("#!/bin/sh\necho 'ruff {version}'\n")).unwrap();
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        };
        write_script("0.4.2");

        let locator = ExecutableLocator::with_install_dir(None, None);
        let invoker = ProcessInvoker::new(1);
        assert_eq!(locator.version(&exe, &invoker).await.unwrap(), Version::new(0, 4, 2));

        // Same mtime: served from the cache even though the file changed.
        let mtime = std::fs::metadata(&exe).unwrap().modified().unwrap();
        write_script("0.5.0");
        let file = std::fs::File::options().write(true).open(&exe).unwrap();
        file.set_modified(mtime).unwrap();
        drop(file);
        assert_eq!(locator.version(&exe, &invoker).await.unwrap(), Version::new(0, 4, 2));

        // New mtime: re-probed.
        let file = std::fs::File::options().write(true).open(&exe).unwrap();
        file.set_modified(mtime + std::time::Duration::from_secs(5)).unwrap();
        drop(file);
        assert_eq!(locator.version(&exe, &invoker).await.unwrap(), Version::new(0, 5, 0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparseable_version() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ruff");
        std::fs::write(&exe, "#!/bin/sh\necho 'not a version'\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let locator = ExecutableLocator::with_install_dir(None, None);
        let invoker = ProcessInvoker::new(1);
        let err = locator.version(&exe, &invoker).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidVersion { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_probe_waits_for_a_worker() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ruff");
        std::fs::write(&exe, "#!/bin/sh\necho 'ruff 0.5.0'\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let invoker = ProcessInvoker::new(1);
        let busy = invoker.permits().acquire_owned().await.unwrap();
        let probe = {
            let invoker = invoker.clone();
            tokio::spawn(async move {
                ExecutableLocator::with_install_dir(None, None)
                    .version(&exe, &invoker)
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!probe.is_finished());

        drop(busy);
        assert_eq!(probe.await.unwrap().unwrap(), Version::new(0, 5, 0));
    }
}
