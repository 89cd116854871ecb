//! # home-comptime
//!
//! Compile-time evaluator: a tree-walking interpreter over the
//! (already type-checked) AST, restricted to the pure subset the language
//! allows at compile time — arithmetic, comparison, `if`/`while`/`for`/
//! `match`, calls into functions whose bodies stay inside that subset,
//! struct/enum construction, tuple/array construction, indexing, field
//! access, and numeric `as` casts. Anything else (I/O, FFI, `async`, raw
//! pointers, unbounded recursion past the step budget) aborts with a typed
//! [`error::EvalError`] rather than running.
//!
//! Built around a scope-stack-plus-control-flow-signal design.

pub mod error;
pub mod eval;
pub mod value;

pub use error::EvalError;
pub use eval::{Evaluator, DEFAULT_STEP_LIMIT};
pub use value::ComptimeValue;
