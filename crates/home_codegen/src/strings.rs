//! `.rodata` string-literal pool for one compilation unit.
//!
//! Spec §4.8: "String literals: interned in a `.rodata` section; the
//! resulting pointer is materialised at the use site." A plain string
//! literal's `Symbol` (its interned content, already produced by the
//! lexer) is the pool's dedup key — two `Str` expressions with identical
//! text share one `.rodata` entry and one relocatable label, the same way
//! `home-base::Interner` already collapses two identical identifiers to
//! one `Symbol`.

use std::collections::HashMap;

use home_base::{Interner, Symbol};

/// One pooled literal: the synthetic label symbol used as its object-file
/// symbol name, its byte offset within the pool's own buffer, and its
/// length in bytes (NUL terminator not included).
#[derive(Debug, Clone, Copy)]
pub struct PooledString {
    pub label: Symbol,
    pub offset: u64,
    pub len: u64,
}

#[derive(Default)]
pub struct StringPool {
    entries: HashMap<Symbol, PooledString>,
    bytes: Vec<u8>,
    counter: usize,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text` (the resolved content of `content`) and returns its
    /// pooled label, writing a fresh NUL-terminated copy into the pool's
    /// buffer on first sight of this content symbol.
    pub fn intern(&mut self, content: Symbol, text: &str, strings: &mut Interner) -> PooledString {
        if let Some(&pooled) = self.entries.get(&content) {
            return pooled;
        }
        let label_name = format!(".Lstr.{}", self.counter);
        self.counter += 1;
        let label = strings.intern(&label_name);
        let offset = self.bytes.len() as u64;
        let len = text.len() as u64;
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0); // NUL terminator — no fat-pointer length is carried at runtime (`TypeInterner::size_of_primitive`'s `Slice` case is a bare 8-byte pointer), so any stdlib helper that needs a length recovers it by scanning to the terminator.
        let pooled = PooledString { label, offset, len };
        self.entries.insert(content, pooled);
        pooled
    }

    /// Consumes the pool, handing back its raw bytes plus every label's
    /// final offset/size for `program::lower_module` to append to the
    /// module's `.rodata` section and symbol table.
    pub fn finish(self) -> (Vec<u8>, Vec<PooledString>) {
        (self.bytes, self.entries.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_symbols_share_one_label() {
        let mut strings = Interner::new();
        let content = strings.intern("hello");
        let mut pool = StringPool::new();
        let a = pool.intern(content, "hello", &mut strings);
        let b = pool.intern(content, "hello", &mut strings);
        assert_eq!(a.label, b.label);
        assert_eq!(a.offset, b.offset);
    }

    #[test]
    fn distinct_content_gets_distinct_offsets() {
        let mut strings = Interner::new();
        let a_sym = strings.intern("a");
        let b_sym = strings.intern("b");
        let mut pool = StringPool::new();
        let a = pool.intern(a_sym, "a", &mut strings);
        let b = pool.intern(b_sym, "b", &mut strings);
        assert_ne!(a.label, b.label);
        assert!(b.offset > a.offset);
        let (bytes, symbols) = pool.finish();
        assert_eq!(bytes.len(), "a\0b\0".len());
        assert_eq!(symbols.len(), 2);
    }
}
