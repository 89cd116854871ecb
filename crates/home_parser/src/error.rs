//! Parser error taxonomy.

use home_base::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error("invalid left-hand side of assignment")]
    InvalidAssignTarget,
    #[error("invalid numeric literal: {0}")]
    InvalidLiteral(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::UnexpectedToken { .. } => "H0200",
            ParseErrorKind::UnexpectedEof(_) => "H0201",
            ParseErrorKind::InvalidAssignTarget => "H0202",
            ParseErrorKind::InvalidLiteral(_) => "H0203",
        }
    }
}
