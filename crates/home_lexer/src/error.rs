//! Lexer error taxonomy.

use home_base::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated raw string literal")]
    UnterminatedRawString,
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid numeric literal: {0}")]
    InvalidNumber(String),
    #[error("unterminated character literal")]
    UnterminatedChar,
    #[error("empty character literal")]
    EmptyChar,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            LexErrorKind::UnexpectedChar(_) => "H0100",
            LexErrorKind::UnterminatedString => "H0101",
            LexErrorKind::UnterminatedRawString => "H0102",
            LexErrorKind::UnterminatedBlockComment => "H0103",
            LexErrorKind::InvalidEscape(_) => "H0104",
            LexErrorKind::InvalidNumber(_) => "H0105",
            LexErrorKind::UnterminatedChar => "H0106",
            LexErrorKind::EmptyChar => "H0107",
        }
    }
}
