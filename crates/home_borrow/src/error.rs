//! Ownership/borrow error taxonomy, covering the full state lattice
//! (use-after-move, shared/mutable borrow conflicts, assignment-while-
//! borrowed, and reference escape).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("use of `{name}` after it was moved")]
    UseAfterMove { name: String },
    #[error("use of `{name}` after it may have been moved in a previous branch")]
    UseAfterMaybeMove { name: String },
    #[error("cannot move `{name}` a second time")]
    DoubleMove { name: String },
    #[error("cannot take a mutable borrow of `{name}`: it is already borrowed")]
    ConflictingBorrow { name: String },
    #[error("cannot take a mutable borrow of `{name}`: it was already moved")]
    BorrowAfterMove { name: String },
    #[error("cannot assign to `{name}` while it is borrowed")]
    AssignWhileBorrowed { name: String },
    #[error("cannot move out of `{name}` while it is borrowed")]
    MoveWhileBorrowed { name: String },
    #[error("`{name}` does not live long enough to be returned by reference")]
    EscapingReference { name: String },
}

impl OwnershipError {
    pub fn code(&self) -> &'static str {
        match self {
            OwnershipError::UseAfterMove { .. } => "H0400",
            OwnershipError::UseAfterMaybeMove { .. } => "H0401",
            OwnershipError::DoubleMove { .. } => "H0402",
            OwnershipError::ConflictingBorrow { .. } => "H0403",
            OwnershipError::BorrowAfterMove { .. } => "H0404",
            OwnershipError::AssignWhileBorrowed { .. } => "H0405",
            OwnershipError::MoveWhileBorrowed { .. } => "H0406",
            OwnershipError::EscapingReference { .. } => "H0407",
        }
    }
}
