//! Machine-readable JSON output for compiler results.

use serde::Serialize;

use crate::diagnostic::{Diagnostic, Phase, Severity};

/// The top-level JSON document handed to machine consumers.
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub success: bool,
    pub diagnostics: Vec<JsonDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<JsonTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Wall-clock timing per stage, in milliseconds.
#[derive(Debug, Serialize)]
pub struct JsonTiming {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_ms: Option<u64>,
}

/// One diagnostic in JSON form.
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: JsonLocation,
    pub phase: Phase,
}

#[derive(Debug, Serialize)]
pub struct JsonLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<&Diagnostic> for JsonDiagnostic {
    fn from(d: &Diagnostic) -> Self {
        JsonDiagnostic {
            code: d.code.to_string(),
            severity: d.severity,
            message: d.message.clone(),
            location: JsonLocation {
                file: d.location.file.clone(),
                line: d.location.line,
                column: d.location.column,
            },
            phase: d.phase,
        }
    }
}

impl JsonOutput {
    /// Build an output document from collected diagnostics.
    ///
    /// `success` is true iff no error-severity diagnostic was collected;
    /// warnings alone still succeed.
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        JsonOutput {
            success: !diagnostics.iter().any(Diagnostic::is_error),
            diagnostics: diagnostics.iter().map(JsonDiagnostic::from).collect(),
            timing: None,
            output: None,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("JSON output is always serializable")
    }
}
