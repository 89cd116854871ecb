//! # home-types
//!
//! Type inference, trait resolution, and monomorphization bookkeeping for
//! the home compiler. Owns no process-global state: a [`checker::TypeChecker`]
//! is constructed fresh per compilation unit and pushes diagnostics into the
//! caller's `home_diag::DiagnosticBag` as it walks a `home_parser::ast::Module`.
//!
//! Ground types ([`ty::TypeShape`]/[`ty::TypeId`]) are kept structurally
//! separate from the inference-time representation ([`infer::InferType`]);
//! [`infer::UnificationTable::zonk`] is the one-way bridge back to ground
//! types that the borrow checker and codegen consume.

pub mod checker;
pub mod error;
pub mod generics;
pub mod infer;
pub mod symbol;
pub mod trait_table;
pub mod ty;

pub use checker::{FnShape, TypeChecker, TypedAst};
pub use error::TypeError;
pub use generics::{GenericEnv, MonoTable, Specialization, MONOMORPHIZATION_DEPTH_LIMIT};
pub use infer::{InferType, TyVar, UnificationTable};
pub use symbol::{DefId, SymbolInfo, SymbolKind, SymbolTable, Visibility};
pub use trait_table::{ImplBlock, ResolvedMethod, TraitTable};
pub use ty::{BorrowKind, FloatWidth, IntWidth, TypeId, TypeInterner, TypeShape};
