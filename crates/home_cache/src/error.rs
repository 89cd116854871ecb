//! Cache error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at '{path}': {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("cache entry at '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("could not acquire lock for cache entry '{key}' within the timeout")]
    LockTimeout { key: String },
}

impl CacheError {
    pub fn code(&self) -> &'static str {
        match self {
            CacheError::Io { .. } => "H0801",
            CacheError::Corrupt { .. } => "H0802",
            CacheError::LockTimeout { .. } => "H0803",
        }
    }
}
