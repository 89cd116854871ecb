//! Per-run compiler options: the handful of knobs that
//! are read once at startup and threaded through every compilation unit,
//! the same shape as `BuildConfig` in `project::build`.

use home_codegen::TargetFormat;
use home_pass::OptLevel;

/// The compiler's own version, folded into every cache key so upgrading the compiler invalidates every cached object.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct CompileSession {
    pub opt_level: OptLevel,
    pub target_format: TargetFormat,
    /// The symbol codegen treats as the object's entry point; `"main"` for an executable, the library's
    /// public function names otherwise.
    pub entry_name: String,
    pub feature_flags: Vec<String>,
    pub no_cache: bool,
}

impl Default for CompileSession {
    fn default() -> Self {
        CompileSession {
            opt_level: OptLevel::O0,
            target_format: TargetFormat::Elf64,
            entry_name: "main".to_string(),
            feature_flags: Vec::new(),
            no_cache: false,
        }
    }
}
