//! Ariadne-based human-readable rendering.
//!
//! Each diagnostic renders as `error[VFxxxx]`/`warning[VFxxxx]` with the
//! source line, a pointer at the location, and the registry hint as help
//! text. Colour is disabled for non-TTY output so piped and snapshot output
//! stays byte-stable.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::diagnostic::{Diagnostic, Severity};

/// Render one diagnostic against its source text.
///
/// `color` should be false in non-TTY contexts.
pub fn render(diagnostic: &Diagnostic, source: &str, color: bool) -> String {
    let config = Config::default().with_color(color);

    let kind = match diagnostic.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let label_color = match diagnostic.severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
    };

    let span = clamp_span(diagnostic.location.offset as usize, source.len());

    let mut builder = Report::build(kind, span.clone())
        .with_code(diagnostic.code)
        .with_message(&diagnostic.message)
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(&diagnostic.message)
                .with_color(label_color),
        );
    if let Some(hint) = &diagnostic.hint {
        builder.set_help(hint);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

/// Render a batch of diagnostics for one file, in discovery order.
pub fn render_all(diagnostics: &[Diagnostic], source: &str, color: bool) -> String {
    diagnostics
        .iter()
        .map(|d| render(d, source, color))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a non-empty one-byte span at `offset`, clamped into the source.
fn clamp_span(offset: usize, source_len: usize) -> Range<usize> {
    if source_len == 0 {
        return 0..0;
    }
    let start = offset.min(source_len.saturating_sub(1));
    start..(start + 1).min(source_len)
}
