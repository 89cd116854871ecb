//! # home-diag
//!
//! Diagnostic collection and terminal rendering for the home compiler.
//!
//! Every pass (lexer, parser, type checker, borrow checker, codegen) pushes
//! [`Diagnostic`] values into a shared [`DiagnosticBag`] instead of failing
//! fast; the driver crate renders the final, ordered, deduplicated set and
//! picks a process exit code once the pipeline halts or completes.

pub mod bag;
pub mod diagnostic;
pub mod render;
pub mod style;

pub use bag::DiagnosticBag;
pub use diagnostic::{Diagnostic, SecondarySpan, Severity};
pub use render::{render, render_all};
pub use style::Style;
