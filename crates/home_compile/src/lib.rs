//! # home-compile
//!
//! Wires the other crates into one pipeline: [`driver::compile_unit`]
//! runs lex -> macro-expand -> parse -> optimize -> type-check -> borrow-check ->
//! codegen -> object emission for a single source file, consulting [`home_cache`] first;
//! [`scheduler::run_pool`] fans that out across a worker-pool of OS threads
//! for a multi-file build; [`interpret::interpret`] takes the
//! tree-walking shortcut through `home-comptime` for `run --interpret`.

pub mod driver;
pub mod error;
pub mod interpret;
pub mod scheduler;
pub mod session;

pub use driver::{check_unit, compile_unit, UnitResult};
pub use error::CompileError;
pub use interpret::{interpret, interpret_module, InterpretResult};
pub use scheduler::{run_pool, CompileJob, JobResult};
pub use session::CompileSession;
