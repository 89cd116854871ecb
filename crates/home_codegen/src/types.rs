//! Small type-classification helpers shared by [`crate::expr`] and
//! [`crate::stmt`], split out the way `codegen::types` stays
//! separate from `codegen::expr`/`codegen::stmt` — there it maps a source
//! `TypeExpr` to a Rust type string; here it answers the two questions
//! codegen actually needs to make a lowering decision: "is this value
//! passed by pointer?" and "is this arithmetic signed?".

use home_types::ty::{IntWidth, TypeId, TypeInterner, TypeShape};
use home_types::TypedAst;

/// Aggregates (struct/enum/array/tuple) are always handled by reference
/// within a frame.
pub fn is_aggregate(interner: &TypeInterner, ty: TypeId) -> bool {
    matches!(interner.shape(ty), TypeShape::Generic(_, _) | TypeShape::Array(_, _) | TypeShape::Tuple(_))
}

pub fn int_width(interner: &TypeInterner, ty: TypeId) -> Option<IntWidth> {
    match interner.shape(ty) {
        TypeShape::Int(w) => Some(*w),
        _ => None,
    }
}

pub fn expr_type(typed: &TypedAst, key: home_types::checker::NodeKey) -> TypeId {
    typed.expr_types.get(&key).copied().unwrap_or_else(|| typed.interner.unknown())
}
