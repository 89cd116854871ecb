//! # home-borrow
//!
//! Flow-sensitive ownership and borrow-lifetime analysis over the typed
//! AST. A clone-state-then-merge walk over the full `{Owned, Moved,
//! Shared(n), BorrowedMut}` lattice, adding block-scoped borrow release and
//! a return-escape check. Diagnostics are pushed into the caller's
//! `home_diag::DiagnosticBag`, matching every other pass's best-effort
//! style.

pub mod checker;
pub mod error;
pub mod state;

pub use checker::{BorrowChecker, DropPlan};
pub use error::OwnershipError;
pub use state::VarState;
