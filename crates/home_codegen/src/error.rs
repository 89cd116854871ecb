//! Codegen error taxonomy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("unresolved type reached codegen for `{name}`")]
    UnresolvedType { name: String },
    #[error("layout of `{name}` overflows a 32-bit offset ({size} bytes)")]
    LayoutOverflow { name: String, size: u64 },
    #[error("codegen has no lowering for `{op}`")]
    UnsupportedOp { op: String },
}

impl CodegenError {
    pub fn code(&self) -> &'static str {
        match self {
            CodegenError::UnresolvedType { .. } => "H0600",
            CodegenError::LayoutOverflow { .. } => "H0601",
            CodegenError::UnsupportedOp { .. } => "H0602",
        }
    }
}
