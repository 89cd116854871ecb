//! Cache key derivation: a BLAKE3 hash of the
//! normalized source text, compiler version, optimization level, feature
//! flags, and the hashes of every transitive dependency, so that any
//! change anywhere in the dependency graph invalidates the right entries.

use std::fmt;

/// The content hash identifying one compiled module's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Builds a key from the compilation inputs that determine an object's
    /// bytes, in a fixed, documented
    /// order so the same inputs always hash to the same key regardless of
    /// call-site argument order.
    pub fn build(source_text: &str, compiler_version: &str, optimization_level: &str, feature_flags: &[&str], dependency_hashes: &[CacheKey]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize(source_text).as_bytes());
        hasher.update(b"\0");
        hasher.update(compiler_version.as_bytes());
        hasher.update(b"\0");
        hasher.update(optimization_level.as_bytes());
        hasher.update(b"\0");
        for flag in feature_flags {
            hasher.update(flag.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"\0");
        for dep in dependency_hashes {
            hasher.update(&dep.0);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// The first two hex bytes, used as the cache's on-disk shard
    /// directory.
    pub fn shard(&self) -> String {
        hex_byte(self.0[0]) + &hex_byte(self.0[1])
    }

    pub fn hex(&self) -> String {
        self.0.iter().map(|b| hex_byte(*b)).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

fn hex_byte(b: u8) -> String {
    format!("{b:02x}")
}

/// Line-ending and trailing-whitespace normalization, so a file saved with
/// CRLF or a trailing newline added by an editor doesn't miss the cache.
fn normalize(source: &str) -> String {
    source.replace("\r\n", "\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_hash_identically() {
        let a = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        let b = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_optimization_level_changes_the_key() {
        let a = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        let b = CacheKey::build("fn main() {}", "0.1.0", "O2", &[], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn crlf_and_trailing_newline_normalize_to_the_same_key() {
        let a = CacheKey::build("fn main() {}\n", "0.1.0", "O0", &[], &[]);
        let b = CacheKey::build("fn main() {}\r\n", "0.1.0", "O0", &[], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn dependency_hash_changes_propagate() {
        let dep_a = CacheKey::build("mod a v1", "0.1.0", "O0", &[], &[]);
        let dep_b = CacheKey::build("mod a v2", "0.1.0", "O0", &[], &[]);
        let main_a = CacheKey::build("use a;", "0.1.0", "O0", &[], &[dep_a]);
        let main_b = CacheKey::build("use a;", "0.1.0", "O0", &[], &[dep_b]);
        assert_ne!(main_a, main_b);
    }

    #[test]
    fn shard_is_first_two_hex_bytes() {
        let key = CacheKey::build("x", "0.1.0", "O0", &[], &[]);
        assert_eq!(key.shard().len(), 4);
        assert!(key.hex().starts_with(&key.shard()));
    }
}
