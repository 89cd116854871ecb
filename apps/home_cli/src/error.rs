//! CLI-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Manifest(#[from] crate::config::ManifestError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Compile(#[from] home_compile::CompileError),
    #[error("no home.toml found in '{0}' or any parent directory")]
    NoProject(String),
    #[error("'{0}' already exists")]
    ManifestExists(String),
    #[error("no script named '{0}' in [scripts]")]
    NoScript(String),
    #[error("compilation reported {0} diagnostic(s)")]
    Diagnostics(i32),
    #[error("'{0}' is not yet implemented")]
    NotImplemented(&'static str),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Diagnostics(code) => *code,
            CliError::NotImplemented(_) | CliError::NoProject(_) | CliError::ManifestExists(_) | CliError::NoScript(_) | CliError::Manifest(_) => 2,
            CliError::Io(_) | CliError::Compile(_) => 1,
        }
    }
}
