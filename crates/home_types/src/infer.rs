//! Robinson-style unification over [`InferType`]:
//! solve with type variables during inference, then "zonk" back to
//! the ground [`crate::ty::TypeId`] representation everything downstream
//! (borrow checker, codegen) consumes.

use crate::error::TypeError;
use crate::ty::{BorrowKind, FloatWidth, IntWidth, TypeId, TypeInterner, TypeShape};
use home_base::Symbol;

/// An unbound type variable allocated during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// Inference-time type representation: every ground shape plus the
/// inference-only `Var`/`Unknown` extensions.
#[derive(Debug, Clone, PartialEq)]
pub enum InferType {
    Int(IntWidth),
    Float(FloatWidth),
    Bool,
    Never,
    Unit,
    Array(Box<InferType>, u64),
    Slice(Box<InferType>),
    Tuple(Vec<InferType>),
    Function(Vec<InferType>, Box<InferType>),
    Reference(BorrowKind, Box<InferType>),
    Generic(Symbol, Vec<InferType>),
    TraitObject(Symbol),
    /// Unresolved integer-literal type: defaults to `i64` if never
    /// constrained by context.
    IntLiteral,
    /// Unresolved float-literal type: defaults to `f64`.
    FloatLiteral,
    Var(TyVar),
    Unknown,
}

impl InferType {
    pub fn from_ground(interner: &TypeInterner, id: TypeId) -> Self {
        match interner.shape(id).clone() {
            TypeShape::Int(w) => InferType::Int(w),
            TypeShape::Float(w) => InferType::Float(w),
            TypeShape::Bool => InferType::Bool,
            TypeShape::Never => InferType::Never,
            TypeShape::Unit => InferType::Unit,
            TypeShape::Array(elem, n) => InferType::Array(Box::new(Self::from_ground(interner, elem)), n),
            TypeShape::Slice(elem) => InferType::Slice(Box::new(Self::from_ground(interner, elem))),
            TypeShape::Tuple(elems) => {
                InferType::Tuple(elems.iter().map(|e| Self::from_ground(interner, *e)).collect())
            }
            TypeShape::Function(params, ret) => InferType::Function(
                params.iter().map(|p| Self::from_ground(interner, *p)).collect(),
                Box::new(Self::from_ground(interner, ret)),
            ),
            TypeShape::Reference(k, inner) => InferType::Reference(k, Box::new(Self::from_ground(interner, inner))),
            TypeShape::Generic(name, args) => {
                InferType::Generic(name, args.iter().map(|a| Self::from_ground(interner, *a)).collect())
            }
            TypeShape::TraitObject(name) => InferType::TraitObject(name),
            TypeShape::Unknown => InferType::Unknown,
        }
    }
}

/// Union-find bindings table for [`TyVar`]s, plus the literal-default rule:
/// an integer defaults to `i64`, a float to `f64`, in the absence of any
/// other constraint.
pub struct UnificationTable {
    bindings: Vec<Option<InferType>>,
}

impl UnificationTable {
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    pub fn fresh(&mut self) -> TyVar {
        let id = self.bindings.len() as u32;
        self.bindings.push(None);
        TyVar(id)
    }

    fn find(&self, var: TyVar) -> InferType {
        match &self.bindings[var.0 as usize] {
            Some(InferType::Var(next)) => self.find(*next),
            Some(other) => other.clone(),
            None => InferType::Var(var),
        }
    }

    /// Fully resolves a type, substituting bound variables transitively.
    pub fn resolve(&self, ty: &InferType) -> InferType {
        match ty {
            InferType::Var(v) => {
                let resolved = self.find(*v);
                if matches!(resolved, InferType::Var(v2) if v2 == *v) {
                    resolved
                } else {
                    self.resolve(&resolved)
                }
            }
            InferType::Array(e, n) => InferType::Array(Box::new(self.resolve(e)), *n),
            InferType::Slice(e) => InferType::Slice(Box::new(self.resolve(e))),
            InferType::Tuple(es) => InferType::Tuple(es.iter().map(|e| self.resolve(e)).collect()),
            InferType::Function(ps, r) => {
                InferType::Function(ps.iter().map(|p| self.resolve(p)).collect(), Box::new(self.resolve(r)))
            }
            InferType::Reference(k, e) => InferType::Reference(*k, Box::new(self.resolve(e))),
            InferType::Generic(name, args) => InferType::Generic(*name, args.iter().map(|a| self.resolve(a)).collect()),
            other => other.clone(),
        }
    }

    /// Attempts to unify `a` and `b`, binding free variables as needed.
    /// `Unknown` unifies with anything.
    pub fn unify(&mut self, a: &InferType, b: &InferType) -> Result<InferType, TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        match (&a, &b) {
            (InferType::Unknown, _) => Ok(b),
            (_, InferType::Unknown) => Ok(a),
            (InferType::Var(v), _) => {
                self.bind(*v, b.clone())?;
                Ok(b)
            }
            (_, InferType::Var(v)) => {
                self.bind(*v, a.clone())?;
                Ok(a)
            }
            (InferType::IntLiteral, InferType::IntLiteral) => Ok(InferType::IntLiteral),
            (InferType::IntLiteral, InferType::Int(w)) | (InferType::Int(w), InferType::IntLiteral) => {
                Ok(InferType::Int(*w))
            }
            (InferType::FloatLiteral, InferType::FloatLiteral) => Ok(InferType::FloatLiteral),
            (InferType::FloatLiteral, InferType::Float(w)) | (InferType::Float(w), InferType::FloatLiteral) => {
                Ok(InferType::Float(*w))
            }
            (InferType::Int(x), InferType::Int(y)) if x == y => Ok(a),
            (InferType::Float(x), InferType::Float(y)) if x == y => Ok(a),
            (InferType::Bool, InferType::Bool) => Ok(InferType::Bool),
            (InferType::Unit, InferType::Unit) => Ok(InferType::Unit),
            (InferType::Never, other) | (other, InferType::Never) => Ok(other.clone()),
            (InferType::Array(e1, n1), InferType::Array(e2, n2)) if n1 == n2 => {
                Ok(InferType::Array(Box::new(self.unify(e1, e2)?), *n1))
            }
            (InferType::Slice(e1), InferType::Slice(e2)) => Ok(InferType::Slice(Box::new(self.unify(e1, e2)?))),
            (InferType::Tuple(es1), InferType::Tuple(es2)) if es1.len() == es2.len() => {
                let mut out = Vec::with_capacity(es1.len());
                for (x, y) in es1.iter().zip(es2) {
                    out.push(self.unify(x, y)?);
                }
                Ok(InferType::Tuple(out))
            }
            (InferType::Reference(k1, e1), InferType::Reference(k2, e2)) if k1 == k2 => {
                Ok(InferType::Reference(*k1, Box::new(self.unify(e1, e2)?)))
            }
            (InferType::Generic(n1, a1), InferType::Generic(n2, a2)) if n1 == n2 && a1.len() == a2.len() => {
                let mut out = Vec::with_capacity(a1.len());
                for (x, y) in a1.iter().zip(a2) {
                    out.push(self.unify(x, y)?);
                }
                Ok(InferType::Generic(*n1, out))
            }
            (InferType::TraitObject(n1), InferType::TraitObject(n2)) if n1 == n2 => Ok(a),
            _ => Err(TypeError::Mismatch { expected: format!("{a:?}"), found: format!("{b:?}") }),
        }
    }

    fn bind(&mut self, var: TyVar, ty: InferType) -> Result<(), TypeError> {
        if occurs(var, &ty) {
            return Err(TypeError::RecursiveType { description: format!("{:?}", ty) });
        }
        self.bindings[var.0 as usize] = Some(ty);
        Ok(())
    }

    /// Converts a fully-inferred [`InferType`] back to a ground [`TypeId`],
    /// defaulting unconstrained literals/variables to their defaults and
    /// mapping leftover `Unknown`/unbound variables to the interner's
    /// `Unknown` sentinel.
    pub fn zonk(&self, interner: &mut TypeInterner, ty: &InferType) -> TypeId {
        let resolved = self.resolve(ty);
        self.zonk_resolved(interner, &resolved)
    }

    fn zonk_resolved(&self, interner: &mut TypeInterner, ty: &InferType) -> TypeId {
        match ty {
            InferType::Int(w) => interner.intern(TypeShape::Int(*w)),
            InferType::Float(w) => interner.intern(TypeShape::Float(*w)),
            InferType::Bool => interner.bool(),
            InferType::Never => interner.never(),
            InferType::Unit => interner.unit(),
            InferType::IntLiteral => interner.i64(),
            InferType::FloatLiteral => interner.f64(),
            InferType::Array(e, n) => {
                let elem = self.zonk_resolved(interner, e);
                interner.intern(TypeShape::Array(elem, *n))
            }
            InferType::Slice(e) => {
                let elem = self.zonk_resolved(interner, e);
                interner.intern(TypeShape::Slice(elem))
            }
            InferType::Tuple(es) => {
                let ids = es.iter().map(|e| self.zonk_resolved(interner, e)).collect();
                interner.intern(TypeShape::Tuple(ids))
            }
            InferType::Function(ps, r) => {
                let param_ids = ps.iter().map(|p| self.zonk_resolved(interner, p)).collect();
                let ret_id = self.zonk_resolved(interner, r);
                interner.intern(TypeShape::Function(param_ids, ret_id))
            }
            InferType::Reference(k, e) => {
                let inner = self.zonk_resolved(interner, e);
                interner.intern(TypeShape::Reference(*k, inner))
            }
            InferType::Generic(name, args) => {
                let arg_ids = args.iter().map(|a| self.zonk_resolved(interner, a)).collect();
                interner.intern(TypeShape::Generic(*name, arg_ids))
            }
            InferType::TraitObject(name) => interner.intern(TypeShape::TraitObject(*name)),
            InferType::Var(_) | InferType::Unknown => interner.unknown(),
        }
    }
}

impl Default for UnificationTable {
    fn default() -> Self {
        Self::new()
    }
}

fn occurs(var: TyVar, ty: &InferType) -> bool {
    match ty {
        InferType::Var(v) => *v == var,
        InferType::Array(e, _) | InferType::Slice(e) | InferType::Reference(_, e) => occurs(var, e),
        InferType::Tuple(es) => es.iter().any(|e| occurs(var, e)),
        InferType::Function(ps, r) => ps.iter().any(|p| occurs(var, p)) || occurs(var, r),
        InferType::Generic(_, args) => args.iter().any(|a| occurs(var, a)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_var_with_concrete() {
        let mut table = UnificationTable::new();
        let v = table.fresh();
        let result = table.unify(&InferType::Var(v), &InferType::Bool).unwrap();
        assert_eq!(result, InferType::Bool);
        assert_eq!(table.resolve(&InferType::Var(v)), InferType::Bool);
    }

    #[test]
    fn int_literal_defaults_to_i64() {
        let mut interner = TypeInterner::new();
        let table = UnificationTable::new();
        let id = table.zonk(&mut interner, &InferType::IntLiteral);
        assert_eq!(id, interner.i64());
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let mut table = UnificationTable::new();
        let v = table.fresh();
        let cyclic = InferType::Array(Box::new(InferType::Var(v)), 1);
        let err = table.unify(&InferType::Var(v), &cyclic);
        assert!(err.is_err());
    }

    #[test]
    fn mismatched_primitives_error() {
        let mut table = UnificationTable::new();
        let err = table.unify(&InferType::Bool, &InferType::Int(IntWidth::I64));
        assert!(err.is_err());
    }
}
