//! Top-level compile error: wraps whichever phase failed badly
//! enough to stop the pipeline outright (I/O, or an internal invariant
//! violation a `Diagnostic` can't represent). Ordinary source errors never
//! reach this type — they flow into the caller's `home_diag::DiagnosticBag`
//! and the pipeline keeps going on a best-effort basis.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not read '{path}': {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("codegen failed: {0}")]
    Codegen(#[from] home_codegen::CodegenError),
    #[error("artifact cache error: {0}")]
    Cache(#[from] home_cache::CacheError),
}
