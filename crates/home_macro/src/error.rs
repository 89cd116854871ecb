//! Macro-expansion error taxonomy.

use home_base::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MacroErrorKind {
    #[error("expected a macro name after 'macro'")]
    ExpectedName,
    #[error("expected '(' after macro name")]
    ExpectedParamList,
    #[error("expected a parameter name")]
    ExpectedParamName,
    #[error("expected '{{' to start a macro body")]
    ExpectedBody,
    #[error("unterminated macro body")]
    UnterminatedBody,
    #[error("macro '{0}' was invoked with {1} argument(s), but is declared with {2} parameter(s)")]
    ArityMismatch(String, usize, usize),
    #[error("unterminated macro invocation")]
    UnterminatedInvocation,
    #[error("macro expansion did not reach a fixed point within the recursion budget")]
    RecursionLimitExceeded,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct MacroError {
    pub kind: MacroErrorKind,
    pub span: Span,
}

impl MacroError {
    pub fn new(kind: MacroErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            MacroErrorKind::ExpectedName => "H0700",
            MacroErrorKind::ExpectedParamList => "H0701",
            MacroErrorKind::ExpectedParamName => "H0702",
            MacroErrorKind::ExpectedBody => "H0703",
            MacroErrorKind::UnterminatedBody => "H0704",
            MacroErrorKind::ArityMismatch(..) => "H0705",
            MacroErrorKind::UnterminatedInvocation => "H0706",
            MacroErrorKind::RecursionLimitExceeded => "H0707",
        }
    }
}
