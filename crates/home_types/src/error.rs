//! Type-checking error taxonomy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("expected `{expected}`, found `{found}`")]
    Mismatch { expected: String, found: String },
    #[error("cannot resolve name `{name}`")]
    UnresolvedName { name: String },
    #[error("ambiguous method `{method}` on `{ty}`: {candidates} candidates")]
    AmbiguousMethod { ty: String, method: String, candidates: usize },
    #[error("`{ty}` does not satisfy bound `{bound}`")]
    UnsatisfiedBound { ty: String, bound: String },
    #[error("expected {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("invalid cast from `{from}` to `{to}`")]
    InvalidCast { from: String, to: String },
    #[error("recursive type has no finite representation: {description}")]
    RecursiveType { description: String },
    #[error("monomorphization of `{def}` exceeded the depth limit; the generic call graph likely diverges")]
    MonomorphizationLimitExceeded { def: String },
}

impl TypeError {
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::Mismatch { .. } => "H0300",
            TypeError::UnresolvedName { .. } => "H0301",
            TypeError::AmbiguousMethod { .. } => "H0302",
            TypeError::UnsatisfiedBound { .. } => "H0303",
            TypeError::ArityMismatch { .. } => "H0304",
            TypeError::InvalidCast { .. } => "H0305",
            TypeError::RecursiveType { .. } => "H0306",
            TypeError::MonomorphizationLimitExceeded { .. } => "H0307",
        }
    }
}
