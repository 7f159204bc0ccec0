//! Shared infrastructure for the Vibefun compiler front-end.
//!
//! Source locations, the coded diagnostic model, the static diagnostic
//! registry, the append-only collector, and the two output formats
//! (ariadne-rendered human text and serde-backed JSON).

pub mod diagnostic;
pub mod json;
pub mod registry;
pub mod render;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticCollector, Phase, Severity};
pub use span::{LineIndex, Location, Span};
