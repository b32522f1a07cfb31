//! Version requirements and the capability model of the installed executable.
//!
//! Every behavior that changed across `ruff` releases is decided here from the
//! parsed version. The rest of the crate asks a [`Capabilities`] value instead
//! of comparing versions itself.

use semver::Version;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{EngineError, EngineResult};

/// Half-open version range `[min, max)`. Either bound may be absent.
///
/// Ordering follows semver, so pre-releases of a later version satisfy a
/// lower bound (`0.3.0-dev` is `>=0.2.1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<Version>,
    pub max: Option<Version>,
}

impl VersionRange {
    pub fn at_least(min: Version) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: Version, max: Version) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.min.as_ref().map_or(true, |min| version >= min)
            && self.max.as_ref().map_or(true, |max| version < max)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => write!(f, ">={min},<{max}"),
            (Some(min), None) => write!(f, ">={min}"),
            (None, Some(max)) => write!(f, "<{max}"),
            (None, None) => f.write_str("*"),
        }
    }
}

/// User-facing operations gated on the executable's version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Lint,
    Fix,
    OrganizeImports,
    Format,
    RangeFormat,
    Explain,
}

impl Operation {
    pub fn requirement(self) -> VersionRange {
        match self {
            Operation::Lint | Operation::Fix | Operation::OrganizeImports | Operation::Explain => {
                VersionRange::at_least(Version::new(0, 0, 189))
            }
            Operation::Format => VersionRange::at_least(Version::new(0, 0, 291)),
            Operation::RangeFormat => VersionRange::at_least(Version::new(0, 2, 1)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Lint => "Linting",
            Operation::Fix => "Fixing",
            Operation::OrganizeImports => "Organizing imports",
            Operation::Format => "Formatting",
            Operation::RangeFormat => "Range formatting",
            Operation::Explain => "Explaining rules",
        })
    }
}

/// Spelling of the output-format option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatFlag {
    /// `--output-format`
    OutputFormat,
    /// `--format` (older releases)
    Format,
}

impl OutputFormatFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormatFlag::OutputFormat => "--output-format",
            OutputFormatFlag::Format => "--format",
        }
    }
}

/// Fix payload generations in the JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixSchema {
    /// Single `content`/`location`/`end_location` replacement.
    SingleEdit,
    /// `edits` list with zero-based columns.
    Edits,
    /// `edits` list with one-based columns.
    EditsOneBased,
}

/// Everything the crate needs to know about one executable version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub version: Version,
    pub check_subcommand: bool,
    pub output_format_flag: OutputFormatFlag,
    pub fix_schema: FixSchema,
    /// Findings carry the notebook cell they belong to.
    pub cell_attribution: bool,
    /// Syntax errors are reported with a null code instead of `E999`.
    pub syntax_errors_without_code: bool,
}

impl Capabilities {
    pub fn for_version(version: Version) -> Self {
        let at_least = |major, minor, patch| version >= Version::new(major, minor, patch);
        let fix_schema = if at_least(0, 0, 266) {
            FixSchema::EditsOneBased
        } else if at_least(0, 0, 260) {
            FixSchema::Edits
        } else {
            FixSchema::SingleEdit
        };
        Self {
            check_subcommand: at_least(0, 0, 238),
            output_format_flag: if at_least(0, 0, 291) {
                OutputFormatFlag::OutputFormat
            } else {
                OutputFormatFlag::Format
            },
            fix_schema,
            cell_attribution: at_least(0, 1, 0),
            syntax_errors_without_code: at_least(0, 5, 0),
            version,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        operation.requirement().contains(&self.version)
    }

    /// Fails with a user-visible error naming the requirement when the
    /// operation is not supported.
    pub fn require(&self, operation: Operation, path: &Path) -> EngineResult<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(EngineError::Capability {
                operation,
                requirement: operation.requirement(),
                found: self.version.clone(),
                path: path.to_path_buf(),
            })
        }
    }

    /// Whether a finding code denotes a syntax error for this version.
    pub fn is_syntax_error_code(&self, code: Option<&str>) -> bool {
        match code {
            None => true,
            Some(code) => !self.syntax_errors_without_code && code == "E999",
        }
    }
}

/// Memoizes [`Capabilities`] per version.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<Version, Arc<Capabilities>>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, version: &Version) -> Arc<Capabilities> {
        if let Some(caps) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
        {
            return Arc::clone(caps);
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry(version.clone())
                .or_insert_with(|| Arc::new(Capabilities::for_version(version.clone()))),
        )
    }
}

/// Parse the output of `ruff --version` (or a bare version string).
///
/// Lenient: accepts a leading tool name and missing minor/patch components,
/// e.g. `ruff 0.1.6`, `0.2`, `ruff 0.3.0-dev (abc 2024-01-01)`.
pub fn parse_version(text: &str) -> Option<Version> {
    let mut tokens = text.split_whitespace();
    let mut token = tokens.next()?;
    if token.eq_ignore_ascii_case("ruff") {
        token = tokens.next()?;
    }
    let token = token.trim_start_matches('v');
    if let Ok(version) = Version::parse(token) {
        return Some(version);
    }

    let (core, suffix) = match token.find(['-', '+']) {
        Some(idx) => token.split_at(idx),
        None => (token, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{suffix}", parts.join("."))).ok()
}
