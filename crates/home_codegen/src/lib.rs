//! Native x86-64 code generator: lowers the borrow-checked
//! AST to machine bytes in an ELF64 or Mach-O 64 relocatable object.
//!
//! `layout`/`frame` compute where every value lives; `context`/`types`
//! hold the per-function lowering state; `expr`/`stmt` walk the AST;
//! `program` ties a whole module together; `object` serializes the
//! result to the target platform's container format.

pub mod context;
pub mod emit;
pub mod error;
pub mod frame;
pub mod layout;
pub mod object;
pub mod program;
pub mod stmt;
pub mod strings;
pub mod types;

mod expr;

#[cfg(feature = "trial")]
pub mod trial;

pub use error::CodegenError;
pub use object::{ObjectModule, TargetFormat};
pub use program::lower_module;
