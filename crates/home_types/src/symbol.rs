//! Symbol table: scoped name resolution backed by dense `DefId`s rather
//! than parent back-pointers.

use crate::ty::TypeId;
use home_base::{Span, Symbol};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Crate,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Trait,
    Local,
    Param,
    Const,
}

#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub kind: SymbolKind,
    pub ty: TypeId,
    pub visibility: Visibility,
    pub definition_site: Span,
    pub references: Vec<Span>,
}

#[derive(Default)]
struct Scope {
    parent: Option<usize>,
    bindings: HashMap<Symbol, DefId>,
}

/// A scoped symbol table pinned to AST block structure: entering a block
/// pushes a scope, leaving it pops back to the parent.
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: usize,
    defs: Vec<SymbolInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::default()], current: 0, defs: Vec::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope { parent: Some(self.current), bindings: HashMap::new() });
        self.current = self.scopes.len() - 1;
    }

    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    pub fn declare(&mut self, name: Symbol, info: SymbolInfo) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(info);
        self.scopes[self.current].bindings.insert(name, id);
        id
    }

    /// Walks from the current scope up through parents, stopping at the
    /// first binding found.
    pub fn resolve(&self, name: Symbol) -> Option<DefId> {
        let mut scope = Some(self.current);
        while let Some(idx) = scope {
            if let Some(&id) = self.scopes[idx].bindings.get(&name) {
                return Some(id);
            }
            scope = self.scopes[idx].parent;
        }
        None
    }

    pub fn info(&self, id: DefId) -> &SymbolInfo {
        &self.defs[id.0 as usize]
    }

    pub fn info_mut(&mut self, id: DefId) -> &mut SymbolInfo {
        &mut self.defs[id.0 as usize]
    }

    pub fn record_reference(&mut self, id: DefId, span: Span) {
        self.defs[id.0 as usize].references.push(span);
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeInterner;

    #[test]
    fn resolves_through_parent_scopes() {
        let interner = TypeInterner::new();
        let mut table = SymbolTable::new();
        let mut base_interner = home_base::Interner::new();
        let x = base_interner.intern("x");
        let def = table.declare(
            x,
            SymbolInfo {
                kind: SymbolKind::Local,
                ty: interner.i64(),
                visibility: Visibility::Private,
                definition_site: Span::default(),
                references: Vec::new(),
            },
        );
        table.push_scope();
        assert_eq!(table.resolve(x), Some(def));
        table.pop_scope();
        assert_eq!(table.resolve(x), Some(def));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let interner = TypeInterner::new();
        let mut table = SymbolTable::new();
        let mut base_interner = home_base::Interner::new();
        let x = base_interner.intern("x");
        let outer = table.declare(
            x,
            SymbolInfo { kind: SymbolKind::Local, ty: interner.i64(), visibility: Visibility::Private, definition_site: Span::default(), references: vec![] },
        );
        table.push_scope();
        let inner = table.declare(
            x,
            SymbolInfo { kind: SymbolKind::Local, ty: interner.bool(), visibility: Visibility::Private, definition_site: Span::default(), references: vec![] },
        );
        assert_eq!(table.resolve(x), Some(inner));
        table.pop_scope();
        assert_eq!(table.resolve(x), Some(outer));
    }
}
