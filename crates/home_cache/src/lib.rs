//! Content-addressed artifact cache: keys compiled modules by
//! a BLAKE3 hash of their normalized source, flags, and transitive
//! dependency hashes, and stores the resulting object bytes on disk so a
//! later build with identical inputs can skip straight to linking.
//!
//! Follows `project::loader::Loader` (an in-memory,
//! URI-keyed cache over `ModuleSource`s) generalized to a two-level
//! on-disk store: the in-process map becomes a directory tree keyed by
//! content hash, and the loader's `resolve`/miss-then-insert shape becomes
//! [`CacheStore::get`]/[`CacheStore::put`].

mod error;
mod key;
mod record;
mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use record::{CacheRecord, TargetFormatTag};
pub use store::CacheStore;
