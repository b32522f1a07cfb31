//! Detection of files that belong to an installed Python library.
//!
//! Such files are skipped when `ignoreStandardLibrary` is set: linting or
//! fixing them is never what the user wants.

use regex::Regex;
use std::path::{Component, Path, PathBuf};

use crate::regex_util::static_regex;

static_regex!(fn python_lib_dir, r"^(?i:python)\d+(\.\d+)?t?$");

/// Whether `path` lies in a Python installation.
///
/// Recognizes `site-packages`/`dist-packages` anywhere in the path, a
/// `lib/pythonX.Y` (or `Lib` on Windows) directory, and any of the
/// `library_paths` reported by a probed interpreter.
pub fn is_library_path(path: &Path, library_paths: &[PathBuf]) -> bool {
    if library_paths
        .iter()
        .any(|prefix| !prefix.as_os_str().is_empty() && path.starts_with(prefix))
    {
        return true;
    }

    let names: Vec<&str> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();

    names
        .iter()
        .any(|name| *name == "site-packages" || *name == "dist-packages")
        || names.windows(2).any(|pair| {
            (pair[0] == "lib" || pair[0] == "Lib" || pair[0] == "lib64")
                && python_lib_dir().is_match(pair[1])
        })
}
