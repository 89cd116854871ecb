//! A multi-type bump arena for AST nodes.
//!
//! `home_base::Arena<T>` is deliberately single-type (one arena per `T`);
//! the AST has over a dozen node types that all need to coexist in one
//! compilation unit's lifetime, so the parser wraps `bumpalo::Bump`
//! directly instead of holding a dozen separate `Arena<T>` fields.

use bumpalo::Bump;

pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    pub fn alloc<T>(&self, value: T) -> &T {
        self.bump.alloc(value)
    }

    pub fn alloc_slice<T>(&self, items: Vec<T>) -> &[T] {
        self.bump.alloc_slice_fill_iter(items)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
