//! Generic type parameter environment and monomorphization bookkeeping.

use crate::symbol::DefId;
use crate::ty::TypeId;
use home_base::Symbol;
use std::collections::HashMap;

/// How deep monomorphization may recurse before it is assumed to be
/// diverging.
pub const MONOMORPHIZATION_DEPTH_LIMIT: usize = 128;

/// Maps a type parameter symbol to the set of trait bounds it must satisfy.
#[derive(Default)]
pub struct GenericEnv {
    bounds: HashMap<Symbol, Vec<Symbol>>,
}

impl GenericEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bound(&mut self, param: Symbol, trait_name: Symbol) {
        self.bounds.entry(param).or_default().push(trait_name);
    }

    pub fn bounds_of(&self, param: Symbol) -> &[Symbol] {
        self.bounds.get(&param).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// The specialized artifact produced for one monomorphization key. Codegen
/// fills in `symbol_name`; the type checker only needs to know a key has
/// been seen, to avoid re-expanding it.
#[derive(Debug, Clone)]
pub struct Specialization {
    pub symbol_name: String,
}

/// `(generic_def_id, ordered_type_args) -> specialization`.
#[derive(Default)]
pub struct MonoTable {
    records: HashMap<(DefId, Vec<TypeId>), Specialization>,
    /// Tracks the expansion depth reached per root definition, so a
    /// recursive generic (`fn wrap<T>(x: T) -> Wrapper<T>` called on its
    /// own output forever) is caught rather than looping forever (spec
    /// §4.4 "depth limit").
    depth: HashMap<DefId, usize>,
}

impl MonoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request to specialize `def` at `args`, returning the
    /// existing specialization if this key was already recorded (so the
    /// type checker and codegen never emit the same symbol twice) or
    /// `Err` once the depth limit for `def` is exceeded.
    pub fn request(&mut self, def: DefId, args: Vec<TypeId>, make: impl FnOnce() -> Specialization) -> Result<Specialization, ()> {
        let key = (def, args);
        if let Some(existing) = self.records.get(&key) {
            return Ok(existing.clone());
        }
        let depth = self.depth.entry(def).or_insert(0);
        *depth += 1;
        if *depth > MONOMORPHIZATION_DEPTH_LIMIT {
            return Err(());
        }
        let spec = make();
        self.records.insert(key, spec.clone());
        Ok(spec)
    }

    pub fn keys(&self) -> impl Iterator<Item = &(DefId, Vec<TypeId>)> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_reuses_specialization() {
        let mut table = MonoTable::new();
        let def = DefId(0);
        let args = vec![TypeId(1)];
        let first = table.request(def, args.clone(), || Specialization { symbol_name: "foo$i64".into() }).unwrap();
        let second = table.request(def, args, || panic!("should not re-specialize")).unwrap();
        assert_eq!(first.symbol_name, second.symbol_name);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn depth_limit_rejects_runaway_recursion() {
        let mut table = MonoTable::new();
        let def = DefId(0);
        for depth in 0..MONOMORPHIZATION_DEPTH_LIMIT {
            table.request(def, vec![TypeId(depth as u32)], || Specialization { symbol_name: format!("f{depth}") }).unwrap();
        }
        let result = table.request(def, vec![TypeId(9999)], || Specialization { symbol_name: "overflow".into() });
        assert!(result.is_err());
    }
}
