//! Diagnostic records: the common currency every compiler pass emits.

use home_base::Span;
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational note, does not affect the exit code.
    Note,
    /// A warning; compilation still succeeds.
    Warning,
    /// A hard error; compilation fails with exit code 1.
    Error,
    /// An internal compiler error: an invariant a later pass assumed was
    /// violated. Exits with code 70.
    Bug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Bug => "internal compiler error",
        };
        write!(f, "{s}")
    }
}

/// A labeled secondary span, shown underneath the primary excerpt.
#[derive(Debug, Clone)]
pub struct SecondarySpan {
    pub span: Span,
    pub label: String,
}

/// One diagnostic: a primary span, a message, optional secondary spans and
/// a suggestion, and a stable `H####`-style code.
///
/// Diagnostics are produced by every compiler phase (lexer, parser, type
/// checker, borrow checker, codegen) and collected into a [`crate::DiagnosticBag`]
/// rather than returned eagerly, so a single run can report more than one
/// problem at once.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    pub secondary_spans: Vec<SecondarySpan>,
    pub suggestion: Option<String>,
    /// Phase that raised this diagnostic, used for ICE reporting.
    pub phase: &'static str,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>, span: Span, phase: &'static str) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            span,
            secondary_spans: Vec::new(),
            suggestion: None,
            phase,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, span: Span, phase: &'static str) -> Self {
        Self::new(Severity::Error, code, message, span, phase)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Span, phase: &'static str) -> Self {
        Self::new(Severity::Warning, code, message, span, phase)
    }

    pub fn bug(message: impl Into<String>, span: Span, phase: &'static str) -> Self {
        Self::new(Severity::Bug, "H0000", message, span, phase)
    }

    pub fn with_secondary(mut self, span: Span, label: impl Into<String>) -> Self {
        self.secondary_spans.push(SecondarySpan { span, label: label.into() });
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Bug)
    }

    /// Dedup key: same code, same primary span, same message collapses to
    /// one diagnostic.
    pub(crate) fn dedup_key(&self) -> (&'static str, usize, usize, &str) {
        (self.code, self.span.start, self.span.end, self.message.as_str())
    }
}
