//! Compile-time evaluation error taxonomy, given a structured `thiserror`
//! enum rather than a stringly-typed error path: the comptime evaluator's
//! errors become `Diagnostic`s, so they need stable codes like every other
//! pass.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("compile-time evaluation exceeded its step budget of {limit}")]
    BudgetExceeded { limit: u64 },
    #[error("`{what}` is not supported in a compile-time context")]
    UnsupportedConstruct { what: String },
    #[error("attempt to divide by zero in a compile-time expression")]
    DivisionByZero,
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("`{name}` is not defined in this compile-time context")]
    UndefinedVariable { name: String },
    #[error("`{name}` is not a known function")]
    UndefinedFunction { name: String },
    #[error("`{name}` cannot be called at compile time: its body uses a construct forbidden at compile time")]
    NotComptimeSafe { name: String },
    #[error("index {index} is out of bounds for a collection of length {len}")]
    IndexOutOfBounds { index: i128, len: usize },
    #[error("no field named `{field}` on this value")]
    FieldNotFound { field: String },
    #[error("no match arm covers this value")]
    MatchNotExhaustive,
}

impl EvalError {
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::BudgetExceeded { .. } => "H0500",
            EvalError::UnsupportedConstruct { .. } => "H0501",
            EvalError::DivisionByZero => "H0502",
            EvalError::TypeMismatch { .. } => "H0503",
            EvalError::UndefinedVariable { .. } => "H0504",
            EvalError::UndefinedFunction { .. } => "H0505",
            EvalError::NotComptimeSafe { .. } => "H0506",
            EvalError::IndexOutOfBounds { .. } => "H0507",
            EvalError::FieldNotFound { .. } => "H0508",
            EvalError::MatchNotExhaustive => "H0509",
        }
    }
}
