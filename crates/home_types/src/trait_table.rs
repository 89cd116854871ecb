//! Trait table: required methods, default implementations, blanket impls,
//! and per-`(type, trait)` impl binding.

use crate::ty::TypeId;
use home_base::Symbol;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: Symbol,
    pub has_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TraitDef {
    pub required_methods: Vec<MethodSig>,
}

/// One `impl Trait for Type { .. }` (or an inherent `impl Type { .. }` when
/// `trait_name` is `None`).
#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub trait_name: Option<Symbol>,
    /// `None` for a blanket impl (`impl<T: Bound> Trait for T`); blanket
    /// impls are consulted only after every concrete impl has been tried.
    pub for_type: Option<TypeId>,
    pub methods: HashMap<Symbol, ()>,
}

#[derive(Debug, Clone)]
pub enum ResolvedMethod {
    Concrete,
    Blanket,
    Default,
}

#[derive(Default)]
pub struct TraitTable {
    traits: HashMap<Symbol, TraitDef>,
    /// All impl blocks seen, in declaration order. Search walks them
    /// linearly three times (concrete, then blanket, then trait defaults)
    /// rather than pre-indexing, since impl counts per program are small
    /// and the search order itself is the contract callers rely on.
    impls: Vec<ImplBlock>,
}

impl TraitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_trait(&mut self, name: Symbol, def: TraitDef) {
        self.traits.insert(name, def);
    }

    pub fn add_impl(&mut self, block: ImplBlock) {
        self.impls.push(block);
    }

    pub fn trait_def(&self, name: Symbol) -> Option<&TraitDef> {
        self.traits.get(&name)
    }

    /// Implements method resolution order: concrete impls for
    /// the exact type, then blanket impls, then the trait's own default
    /// methods. Returns `None` (unresolved) or `Some(Err(..))` when more
    /// than one concrete impl supplies the same method (ambiguous).
    pub fn resolve_method(
        &self,
        ty: TypeId,
        method: Symbol,
    ) -> Result<Option<ResolvedMethod>, usize> {
        let concrete: Vec<&ImplBlock> = self
            .impls
            .iter()
            .filter(|i| i.for_type == Some(ty) && i.methods.contains_key(&method))
            .collect();
        if concrete.len() > 1 {
            return Err(concrete.len());
        }
        if concrete.len() == 1 {
            return Ok(Some(ResolvedMethod::Concrete));
        }

        let blanket: Vec<&ImplBlock> =
            self.impls.iter().filter(|i| i.for_type.is_none() && i.methods.contains_key(&method)).collect();
        if blanket.len() > 1 {
            return Err(blanket.len());
        }
        if blanket.len() == 1 {
            return Ok(Some(ResolvedMethod::Blanket));
        }

        for def in self.traits.values() {
            if def.required_methods.iter().any(|m| m.name == method && m.has_default) {
                return Ok(Some(ResolvedMethod::Default));
            }
        }
        Ok(None)
    }

    /// `resolve_trait_bound(type, trait) -> impl | NotFound`.
    pub fn resolve_trait_bound(&self, ty: TypeId, trait_name: Symbol) -> bool {
        self.impls.iter().any(|i| i.trait_name == Some(trait_name) && i.for_type == Some(ty))
            || self.impls.iter().any(|i| i.trait_name == Some(trait_name) && i.for_type.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeInterner;

    fn sym(s: &str) -> Symbol {
        let mut i = home_base::Interner::new();
        i.intern(s)
    }

    #[test]
    fn concrete_impl_wins_over_blanket() {
        let interner = TypeInterner::new();
        let mut table = TraitTable::new();
        let show = sym("show");
        let mut blanket_methods = HashMap::new();
        blanket_methods.insert(show, ());
        table.add_impl(ImplBlock { trait_name: Some(sym("Display")), for_type: None, methods: blanket_methods.clone() });
        table.add_impl(ImplBlock { trait_name: Some(sym("Display")), for_type: Some(interner.i64()), methods: blanket_methods });
        let resolved = table.resolve_method(interner.i64(), show).unwrap();
        assert!(matches!(resolved, Some(ResolvedMethod::Concrete)));
    }

    #[test]
    fn ambiguous_concrete_impls_error() {
        let interner = TypeInterner::new();
        let mut table = TraitTable::new();
        let show = sym("show");
        let mut methods = HashMap::new();
        methods.insert(show, ());
        table.add_impl(ImplBlock { trait_name: Some(sym("A")), for_type: Some(interner.i64()), methods: methods.clone() });
        table.add_impl(ImplBlock { trait_name: Some(sym("B")), for_type: Some(interner.i64()), methods });
        assert!(table.resolve_method(interner.i64(), show).is_err());
    }
}
