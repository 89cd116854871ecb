//! The on-disk payload of one cache entry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFormatTag {
    Elf64,
    MachO64,
}

/// What one compiled module's cache entry carries. A verified AST
/// fragment would be the ideal cache value, but the verified AST here is
/// arena-allocated with borrowed
/// references, which has no
/// stable serde encoding, so the cache stores the artifacts a hit can
/// actually reuse directly — the emitted object bytes plus enough
/// metadata to validate and relink them — and a cache hit short-circuits
/// straight past re-parsing rather than resuming mid-pipeline (see
/// DESIGN.md for this simplification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub object_bytes: Vec<u8>,
    pub entry_symbol: String,
    pub target_format: TargetFormatTag,
    /// Exported function name -> mangled/linker symbol, a stand-in for
    /// a symbol-table excerpt for the cached object.
    pub exported_symbols: Vec<String>,
    /// Hex-encoded [`crate::key::CacheKey`] of every transitive
    /// dependency this entry was built against.
    pub dependency_fingerprints: Vec<String>,
}
