//! The diagnostic data model and the per-session collector.
//!
//! Diagnostics are created through [`crate::registry::create`] so every one
//! carries a stable `VFxxxx` code, a severity, the owning phase, and a
//! fully-substituted message. The collector is append-only; errors and
//! warnings accumulate in discovery order and are reported together.

use std::fmt;

use serde::Serialize;

use crate::span::Location;

/// Diagnostic severity. Errors halt the owning stage after best-effort
/// collection within the current unit; warnings never halt anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// The pipeline stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Desugar,
    #[serde(rename = "typecheck")]
    TypeCheck,
    Imports,
    Exports,
    Modules,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Desugar => write!(f, "desugar"),
            Phase::TypeCheck => write!(f, "typecheck"),
            Phase::Imports => write!(f, "imports"),
            Phase::Exports => write!(f, "exports"),
            Phase::Modules => write!(f, "modules"),
        }
    }
}

/// A single coded diagnostic with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable code, e.g. `"VF4001"`.
    pub code: &'static str,
    pub severity: Severity,
    pub phase: Phase,
    /// Fully-substituted message text.
    pub message: String,
    /// Optional fully-substituted hint.
    pub hint: Option<String>,
    pub location: Location,
}

impl Diagnostic {
    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} --> {}",
            self.severity, self.code, self.message, self.location
        )
    }
}

/// Append-only diagnostic collector, owned by the compilation session.
///
/// Diagnostics are appended in the order they are discovered; given
/// deterministic inputs the order is deterministic.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Append every diagnostic from an iterator, preserving order.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Whether any error-severity diagnostic has been collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Whether the collector is empty.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Iterate over the diagnostics in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Consume the collector, yielding the diagnostics in discovery order.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn collector_preserves_order() {
        let mut collector = DiagnosticCollector::new();
        let a = registry::create(
            "VF4004",
            Location::new("a.vf", 1, 1, 0),
            &[("name", "x")],
        );
        let b = registry::create(
            "VF5900",
            Location::new("b.vf", 1, 1, 0),
            &[("cycle", "A -> B -> A")],
        );
        collector.push(a.clone());
        collector.push(b.clone());

        let collected: Vec<_> = collector.iter().cloned().collect();
        assert_eq!(collected, vec![a, b]);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut collector = DiagnosticCollector::new();
        collector.push(registry::create(
            "VF5901",
            Location::new("a.vf", 1, 1, 0),
            &[("imported", "Utils.vf"), ("actual", "utils.vf")],
        ));
        assert!(!collector.has_errors());

        collector.push(registry::create(
            "VF4004",
            Location::new("a.vf", 2, 1, 10),
            &[("name", "y")],
        ));
        assert!(collector.has_errors());
    }

    #[test]
    fn diagnostic_display() {
        let d = registry::create(
            "VF4004",
            Location::new("m.vf", 3, 5, 20),
            &[("name", "foo")],
        );
        assert_eq!(
            d.to_string(),
            "error[VF4004]: undefined variable `foo` --> m.vf:3:5"
        );
    }
}
