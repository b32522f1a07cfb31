//! Command lines for the tool's subcommands.
//!
//! User-supplied arguments are filtered against the flags the engine relies
//! on. The builders take the settings' argument lists by shared reference and
//! always return a fresh vector.

use std::path::Path;

use crate::diagnostics::Range;
use crate::version::Capabilities;

/// Flags every lint run starts with. `-` reads the source from stdin.
const CHECK_ARGS: &[&str] = &[
    "--force-exclude",
    "--no-cache",
    "--no-fix",
    "--quiet",
    "--output-format",
    "json",
    "-",
];

/// User arguments ignored for `check`: they either duplicate or contradict
/// the flags above.
const UNSUPPORTED_CHECK_ARGS: &[&str] = &[
    "--force-exclude",
    "--no-cache",
    "--no-fix",
    "--quiet",
    "--diff",
    "--exit-non-zero-on-fix",
    "-e",
    "--exit-zero",
    "--fix",
    "--fix-only",
    "-h",
    "--help",
    "--no-force-exclude",
    "--show-files",
    "--show-fixes",
    "--show-settings",
    "--show-source",
    "--silent",
    "--statistics",
    "--verbose",
    "-w",
    "--watch",
];

const UNSUPPORTED_FORMAT_ARGS: &[&str] = &[
    "--force-exclude",
    "--quiet",
    "-h",
    "--help",
    "--no-force-exclude",
    "--silent",
    "--verbose",
];

/// Rule selection flags dropped when a single rule is requested.
const SELECTION_ARGS: &[&str] = &["--select", "--extend-select", "--ignore", "--extend-ignore"];

/// Build the argv (without the program) for `ruff check`.
///
/// `extra` is appended right after the fixed flags (e.g. `--fix`). When
/// `only` names a rule, user selection flags are removed and `--select only`
/// is added.
pub fn check_args(
    capabilities: &Capabilities,
    user_args: &[String],
    extra: &[&str],
    only: Option<&str>,
    path: &Path,
) -> Vec<String> {
    let mut argv: Vec<String> = Vec::with_capacity(CHECK_ARGS.len() + user_args.len() + 6);
    if capabilities.check_subcommand {
        argv.push("check".to_string());
    }
    argv.extend(CHECK_ARGS.iter().map(|arg| {
        if *arg == "--output-format" {
            capabilities.output_format_flag.as_str().to_string()
        } else {
            (*arg).to_string()
        }
    }));
    argv.extend(extra.iter().map(|arg| (*arg).to_string()));

    let mut skip_value = false;
    for arg in user_args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if UNSUPPORTED_CHECK_ARGS.contains(&arg.as_str()) {
            tracing::info!(%arg, "Ignoring unsupported argument");
            continue;
        }
        if only.is_some() {
            if SELECTION_ARGS.contains(&arg.as_str()) {
                skip_value = true;
                continue;
            }
            if SELECTION_ARGS
                .iter()
                .any(|flag| arg.strip_prefix(flag).is_some_and(|rest| rest.starts_with('=')))
            {
                continue;
            }
        }
        argv.push(arg.clone());
    }

    if let Some(rule) = only {
        argv.push("--select".to_string());
        argv.push(rule.to_string());
    }
    argv.push("--stdin-filename".to_string());
    argv.push(path.display().to_string());
    argv
}

/// Build the argv for `ruff format`, optionally restricted to `range`.
pub fn format_args(user_args: &[String], path: &Path, range: Option<Range>) -> Vec<String> {
    let mut argv: Vec<String> = ["format", "--force-exclude", "--quiet", "--stdin-filename"]
        .iter()
        .map(|arg| (*arg).to_string())
        .collect();
    argv.push(path.display().to_string());

    for arg in user_args {
        if UNSUPPORTED_FORMAT_ARGS.contains(&arg.as_str()) {
            tracing::info!(%arg, "Ignoring unsupported argument");
        } else {
            argv.push(arg.clone());
        }
    }

    if let Some(range) = range {
        argv.push(format!(
            "--range={}:{}-{}:{}",
            range.start.line + 1,
            range.start.character + 1,
            range.end.line + 1,
            range.end.character + 1
        ));
    }
    argv
}

/// Build the argv for `ruff --explain CODE`.
pub fn explain_args(code: &str) -> Vec<String> {
    vec!["--explain".to_string(), code.to_string()]
}
