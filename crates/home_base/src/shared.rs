//! Process-wide intern pool. [`crate::Interner`] stays the type a single worker's
//! pipeline owns outright; `SharedInterner` exists only for identifiers
//! that need to compare equal *across* the workers a
//! `home-compile::scheduler::run_pool` run spins up, so the multi-unit
//! build path isn't serialized on one mutex for every name it sees.
//!
//! Symbols it hands out are not interchangeable with a plain `Interner`'s:
//! the bucket index is packed into the symbol's low bits, so resolving one
//! requires knowing which `SharedInterner` produced it.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use crate::intern::Symbol;

const BUCKET_COUNT: usize = 16;
const BUCKET_BITS: u32 = 4;
const BUCKET_MASK: u32 = (1 << BUCKET_BITS) - 1;

struct Bucket {
    map: HashMap<String, Symbol>,
    vec: Vec<String>,
}

impl Bucket {
    fn new() -> Self {
        Bucket { map: HashMap::new(), vec: Vec::new() }
    }
}

/// A string interner sharded into [`BUCKET_COUNT`] independently locked
/// buckets. A reader only ever blocks behind writers touching the same
/// bucket, not the whole pool.
pub struct SharedInterner {
    buckets: Vec<RwLock<Bucket>>,
}

impl SharedInterner {
    pub fn new() -> Self {
        SharedInterner { buckets: (0..BUCKET_COUNT).map(|_| RwLock::new(Bucket::new())).collect() }
    }

    fn bucket_for(s: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        (hasher.finish() as usize) % BUCKET_COUNT
    }

    /// Interns `s`, returning its symbol. Takes a read lock on `s`'s
    /// bucket first and only escalates to a write lock when the string
    /// is actually new, so repeated lookups of already-interned
    /// identifiers (the common case once a build warms up) never block
    /// a concurrent writer touching a different bucket.
    pub fn intern(&self, s: &str) -> Symbol {
        let idx = Self::bucket_for(s);

        if let Some(&sym) = self.buckets[idx].read().expect("intern bucket lock is never poisoned by a panicking reader").map.get(s) {
            return sym;
        }

        let mut bucket = self.buckets[idx].write().expect("intern bucket lock is never poisoned by a panicking writer");
        if let Some(&sym) = bucket.map.get(s) {
            return sym;
        }
        let local = bucket.vec.len() as u32;
        let raw = (local << BUCKET_BITS) | idx as u32;
        let sym = Symbol::from_raw(raw);
        bucket.vec.push(s.to_string());
        bucket.map.insert(s.to_string(), sym);
        sym
    }

    /// Looks up an interned string without creating a new entry.
    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        let idx = Self::bucket_for(s);
        self.buckets[idx].read().expect("intern bucket lock is never poisoned by a panicking reader").map.get(s).copied()
    }

    /// Resolves a symbol this pool produced. Returns an owned `String`
    /// rather than `&str`: the backing `Vec` lives behind a lock guard
    /// that cannot outlive this call.
    ///
    /// # Panics
    ///
    /// Panics if `sym` was not produced by this `SharedInterner`.
    pub fn resolve(&self, sym: Symbol) -> String {
        let raw = sym.raw();
        let idx = (raw & BUCKET_MASK) as usize;
        let local = (raw >> BUCKET_BITS) as usize;
        self.buckets[idx].read().expect("intern bucket lock is never poisoned by a panicking reader").vec[local].clone()
    }
}

impl Default for SharedInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn interning_the_same_string_twice_returns_the_same_symbol() {
        let pool = SharedInterner::new();
        let a = pool.intern("hello");
        let b = pool.intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_round_trip_through_resolve() {
        let pool = SharedInterner::new();
        let a = pool.intern("alpha");
        let b = pool.intern("beta");
        assert_eq!(pool.resolve(a), "alpha");
        assert_eq!(pool.resolve(b), "beta");
    }

    #[test]
    fn lookup_misses_an_uninterned_string() {
        let pool = SharedInterner::new();
        pool.intern("known");
        assert!(pool.lookup("unknown").is_none());
        assert!(pool.lookup("known").is_some());
    }

    #[test]
    fn concurrent_interning_of_the_same_strings_is_consistent() {
        let pool = Arc::new(SharedInterner::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                let syms: Vec<Symbol> = (0..100).map(|i| pool.intern(&format!("sym_{}", i % 20))).collect();
                syms
            }));
        }
        let results: Vec<Vec<Symbol>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..20 {
            let expected = results[0][i];
            for result in &results {
                assert_eq!(result[i], expected);
            }
        }
    }
}
