//! Maps core diagnostics to LSP diagnostics.

use std::collections::BTreeMap;

use rufflink_core::{Diagnostic, Fix, Severity, TOOL_DISPLAY};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic as LspDiagnostic, DiagnosticSeverity, DiagnosticTag,
    NumberOrString, Url,
};

use crate::position::to_lsp_range;

/// Everything a code action needs, stored in `diagnostic.data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noqa_row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<usize>,
}

/// Read [`DiagnosticData`] back. Missing or foreign data yields the default.
pub fn diagnostic_data(data: Option<&JsonValue>) -> DiagnosticData {
    data.and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

pub fn to_lsp_diagnostic(diag: &Diagnostic) -> LspDiagnostic {
    let severity = match diag.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
    };

    let code_description = diag
        .url
        .as_deref()
        .and_then(|url| Url::parse(url).ok())
        .map(|href| CodeDescription { href });

    let data = DiagnosticData {
        fix: diag.fix.clone(),
        noqa_row: diag.noqa_row,
        cell: diag.cell,
    };

    LspDiagnostic {
        range: to_lsp_range(diag.range),
        severity: Some(severity),
        code: diag.code.clone().map(NumberOrString::String),
        code_description,
        source: Some(TOOL_DISPLAY.to_string()),
        message: diag.message.clone(),
        related_information: None,
        tags: diag.unnecessary.then(|| vec![DiagnosticTag::UNNECESSARY]),
        data: serde_json::to_value(data).ok(),
    }
}

pub fn to_lsp_diagnostics(diagnostics: &[Diagnostic]) -> Vec<LspDiagnostic> {
    diagnostics.iter().map(to_lsp_diagnostic).collect()
}

/// Split notebook findings by their one-based cell index.
///
/// Findings without a cell belong to the first cell.
pub fn group_by_cell(diagnostics: &[Diagnostic]) -> BTreeMap<usize, Vec<LspDiagnostic>> {
    let mut grouped: BTreeMap<usize, Vec<LspDiagnostic>> = BTreeMap::new();
    for diag in diagnostics {
        grouped
            .entry(diag.cell.unwrap_or(1))
            .or_default()
            .push(to_lsp_diagnostic(diag));
    }
    grouped
}

/// Whether a client-supplied diagnostic came from us.
pub fn is_ruff_diagnostic(diag: &LspDiagnostic) -> bool {
    diag.source.as_deref() == Some(TOOL_DISPLAY)
}

pub fn code_of(diag: &LspDiagnostic) -> Option<&str> {
    match diag.code.as_ref()? {
        NumberOrString::String(code) => Some(code.as_str()),
        NumberOrString::Number(_) => None,
    }
}
