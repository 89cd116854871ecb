//! Struct and enum layout computation"): ascending-address field packing with natural
//! alignment, and a tagged union with an 8-byte discriminant at offset 0.
//!
//! Follows the same idea as `analysis::registry::TypeRegistry`'s field
//! table (resolve every field's type to a size up front so
//! later passes never recompute it) but producing byte offsets for a
//! native stack frame instead of a generated Rust `struct` declaration.

use std::collections::HashMap;

use home_base::Symbol;
use home_types::ty::{TypeId, TypeInterner, TypeShape};
use home_types::TypedAst;

use crate::error::CodegenError;

pub const TAG_SIZE: u32 = 8;

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: Symbol,
    pub ty: TypeId,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct StructLayout {
    pub name: Symbol,
    pub fields: Vec<FieldLayout>,
    pub total_size: u32,
    pub alignment: u32,
}

#[derive(Debug, Clone)]
pub struct VariantLayout {
    pub name: Symbol,
    pub discriminant: u32,
    pub payload_size: u32,
    /// Byte offset of each field within the variant's payload (payload
    /// itself starts at `[base + TAG_SIZE]`), packed ascending the same
    /// way struct fields are.
    pub field_offsets: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct EnumLayout {
    pub name: Symbol,
    pub variants: Vec<VariantLayout>,
    pub tag_size: u32,
    pub payload_size: u32,
    pub total_size: u32,
}

#[derive(Default)]
pub struct LayoutTable {
    pub structs: HashMap<Symbol, StructLayout>,
    pub enums: HashMap<Symbol, EnumLayout>,
}

impl LayoutTable {
    /// Computes every struct's and enum's layout in one pass. Struct field
    /// types may themselves be other structs/enums in `typed`, so each
    /// layout is memoized as it's computed rather than recomputed per use.
    pub fn build(typed: &TypedAst) -> Result<Self, CodegenError> {
        let mut table = LayoutTable::default();
        for name in typed.structs.keys().copied().collect::<Vec<_>>() {
            resolve_struct(name, typed, &mut table)?;
        }
        for name in typed.enums.keys().copied().collect::<Vec<_>>() {
            resolve_enum(name, typed, &mut table)?;
        }
        Ok(table)
    }
}

fn resolve_struct(name: Symbol, typed: &TypedAst, table: &mut LayoutTable) -> Result<u32, CodegenError> {
    if let Some(existing) = table.structs.get(&name) {
        return Ok(existing.total_size);
    }
    let shape = typed.structs.get(&name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?.clone();

    let mut offset: u32 = 0;
    let mut alignment: u32 = 1;
    let mut fields = Vec::with_capacity(shape.fields.len());
    for (field_name, ty) in &shape.fields {
        let (size, align) = size_align_of(*ty, typed, table)?;
        offset = align_up(offset, align);
        fields.push(FieldLayout { name: *field_name, ty: *ty, offset, size });
        offset = offset.checked_add(size).ok_or_else(|| CodegenError::LayoutOverflow { name: format!("{name:?}"), size: offset as u64 + size as u64 })?;
        alignment = alignment.max(align);
    }
    let total_size = align_up(offset, alignment);
    table.structs.insert(name, StructLayout { name, fields, total_size, alignment });
    Ok(total_size)
}

fn resolve_enum(name: Symbol, typed: &TypedAst, table: &mut LayoutTable) -> Result<u32, CodegenError> {
    if let Some(existing) = table.enums.get(&name) {
        return Ok(existing.total_size);
    }
    let shape = typed.enums.get(&name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?.clone();

    let mut variants = Vec::with_capacity(shape.variants.len());
    let mut payload_size: u32 = 0;
    for (discriminant, (variant_name, field_tys)) in shape.variants.iter().enumerate() {
        let mut variant_payload: u32 = 0;
        let mut field_offsets = Vec::with_capacity(field_tys.len());
        for ty in field_tys {
            let (size, align) = size_align_of(*ty, typed, table)?;
            variant_payload = align_up(variant_payload, align);
            field_offsets.push(variant_payload);
            variant_payload += size;
        }
        payload_size = payload_size.max(variant_payload);
        variants.push(VariantLayout { name: *variant_name, discriminant: discriminant as u32, payload_size: variant_payload, field_offsets });
    }
    let total_size = TAG_SIZE + payload_size;
    table.enums.insert(name, EnumLayout { name, variants, tag_size: TAG_SIZE, payload_size, total_size });
    Ok(total_size)
}

/// Size and alignment of a resolved type.
/// Aggregates use their own total size as their alignment, matching the
/// System V convention this compiler targets (no over-aligned types).
fn size_align_of(ty: TypeId, typed: &TypedAst, table: &mut LayoutTable) -> Result<(u32, u32), CodegenError> {
    let interner = &typed.interner;
    if let Some(size) = interner.size_of_primitive(ty) {
        return Ok((size, size.max(1)));
    }
    match interner.shape(ty).clone() {
        TypeShape::Array(elem, len) => {
            let (elem_size, elem_align) = size_align_of(elem, typed, table)?;
            let total = (elem_size as u64) * len;
            let total = u32::try_from(total).map_err(|_| CodegenError::LayoutOverflow { name: format!("{:?}", interner.shape(ty)), size: total })?;
            Ok((total, elem_align))
        }
        TypeShape::Tuple(elems) => {
            let mut offset = 0u32;
            let mut alignment = 1u32;
            for elem in elems {
                let (size, align) = size_align_of(elem, typed, table)?;
                offset = align_up(offset, align) + size;
                alignment = alignment.max(align);
            }
            Ok((align_up(offset, alignment), alignment))
        }
        TypeShape::Function(..) => Ok((8, 8)),
        TypeShape::Generic(name, _) => {
            if typed.structs.contains_key(&name) {
                let size = resolve_struct(name, typed, table)?;
                Ok((size, table.structs[&name].alignment))
            } else if typed.enums.contains_key(&name) {
                let size = resolve_enum(name, typed, table)?;
                Ok((size, TAG_SIZE))
            } else {
                Err(CodegenError::UnresolvedType { name: format!("{name:?}") })
            }
        }
        TypeShape::TraitObject(_) => Ok((16, 8)),
        TypeShape::Unknown => Err(CodegenError::UnresolvedType { name: "<unknown>".into() }),
        _ => unreachable!("primitive/pointer shapes handled by size_of_primitive"),
    }
}

/// Read-only counterpart of [`size_align_of`], usable once every struct's
/// and enum's layout has already been memoized by [`LayoutTable::build`] —
/// needed by `codegen::expr`'s tuple-literal lowering, which only ever
/// holds a shared `&LayoutTable` borrow.
fn size_align_of_resolved(ty: TypeId, typed: &TypedAst, table: &LayoutTable) -> (u32, u32) {
    let interner = &typed.interner;
    if let Some(size) = interner.size_of_primitive(ty) {
        return (size, size.max(1));
    }
    match interner.shape(ty) {
        TypeShape::Array(elem, len) => {
            let (elem_size, elem_align) = size_align_of_resolved(*elem, typed, table);
            (((elem_size as u64) * len) as u32, elem_align)
        }
        TypeShape::Tuple(elems) => {
            let mut offset = 0u32;
            let mut alignment = 1u32;
            for elem in elems.iter() {
                let (size, align) = size_align_of_resolved(*elem, typed, table);
                offset = align_up(offset, align) + size;
                alignment = alignment.max(align);
            }
            (align_up(offset, alignment), alignment)
        }
        TypeShape::Function(..) => (8, 8),
        TypeShape::Generic(name, _) => table
            .structs
            .get(name)
            .map(|s| (s.total_size, s.alignment))
            .or_else(|| table.enums.get(name).map(|e| (e.total_size, TAG_SIZE)))
            .unwrap_or((8, 8)),
        TypeShape::TraitObject(_) => (16, 8),
        _ => (8, 8),
    }
}

/// Ascending-address, naturally-aligned offsets for a tuple's elements —
/// the same packing rule `resolve_struct` applies to named fields, reused
/// for a tuple literal's anonymous ones.
pub(crate) fn tuple_field_offsets(elems: &[TypeId], typed: &TypedAst, table: &LayoutTable) -> Vec<(u32, u32)> {
    let mut offset = 0u32;
    let mut out = Vec::with_capacity(elems.len());
    for ty in elems {
        let (size, align) = size_align_of_resolved(*ty, typed, table);
        offset = align_up(offset, align);
        out.push((offset, size));
        offset += size;
    }
    out
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_diag::DiagnosticBag;
    use home_parser::Arena;
    use home_types::checker::TypeChecker;

    pub(super) fn typed_ast(src: &str) -> TypedAst {
        let mut strings = Interner::new();
        let (tokens, _) = home_lexer::Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut diagnostics = DiagnosticBag::new();
        TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module)
    }

    #[test]
    fn struct_fields_pack_ascending_with_padding() {
        let typed = typed_ast("struct Pair { a: bool, b: i64 }");
        let table = LayoutTable::build(&typed).unwrap();
        let layout = table.structs.values().next().expect("one struct");
        assert_eq!(layout.fields[0].offset, 0);
        assert_eq!(layout.fields[1].offset, 8);
        assert_eq!(layout.total_size, 16);
    }

    #[test]
    fn enum_total_size_is_tag_plus_max_payload() {
        let typed = typed_ast("enum Maybe { Some(i64), None }");
        let table = LayoutTable::build(&typed).unwrap();
        let layout = table.enums.values().next().expect("one enum");
        assert_eq!(layout.tag_size, 8);
        assert_eq!(layout.total_size, 16);
    }

    #[test]
    fn enum_variant_fields_pack_ascending_within_the_payload() {
        let typed = typed_ast("enum Pair { Two(bool, i64), One(i64) }");
        let table = LayoutTable::build(&typed).unwrap();
        let layout = table.enums.values().next().expect("one enum");
        let two = &layout.variants[0];
        assert_eq!(two.field_offsets, vec![0, 8]);
        assert_eq!(two.payload_size, 16);
    }
}

/// Spec §8 properties 6 and 7: for every struct/enum declaration, layout
/// invariants hold regardless of the field types chosen. Fixed example
/// cases above this module pin down specific offsets; these cover the
/// space of arbitrary declarations the examples can't enumerate.
#[cfg(test)]
mod layout_properties {
    use super::tests::typed_ast as build_typed_ast;
    use super::*;
    use proptest::prelude::*;

    const PRIMITIVE_TYPES: &[&str] = &["bool", "i8", "i16", "i32", "i64", "f32", "f64"];

    fn primitive_type() -> impl Strategy<Value = &'static str> {
        prop::sample::select(PRIMITIVE_TYPES)
    }

    proptest! {
        #[test]
        fn struct_field_offsets_are_ascending_and_aligned(field_types in prop::collection::vec(primitive_type(), 1..8)) {
            let fields: Vec<String> = field_types.iter().enumerate().map(|(i, ty)| format!("f{i}: {ty}")).collect();
            let src = format!("struct S {{ {} }}", fields.join(", "));
            let typed = build_typed_ast(&src);
            let table = LayoutTable::build(&typed).expect("every field is a primitive, layout must resolve");
            let layout = table.structs.values().next().expect("one struct");

            let mut prev_end = 0u32;
            for field in &layout.fields {
                prop_assert!(field.offset >= prev_end, "fields must not overlap");
                prev_end = field.offset + field.size;
            }
            prop_assert_eq!(layout.total_size % layout.alignment.max(1), 0, "total size must be a multiple of alignment");
            prop_assert!(layout.total_size >= prev_end);
        }

        #[test]
        fn enum_total_size_is_tag_plus_max_variant_payload(
            variant_field_types in prop::collection::vec(prop::collection::vec(primitive_type(), 0..4), 1..6)
        ) {
            let variants: Vec<String> = variant_field_types
                .iter()
                .enumerate()
                .map(|(i, fields)| {
                    if fields.is_empty() {
                        format!("V{i}")
                    } else {
                        format!("V{i}({})", fields.join(", "))
                    }
                })
                .collect();
            let src = format!("enum E {{ {} }}", variants.join(", "));
            let typed = build_typed_ast(&src);
            let table = LayoutTable::build(&typed).expect("every variant field is a primitive, layout must resolve");
            let layout = table.enums.values().next().expect("one enum");

            prop_assert_eq!(layout.tag_size, TAG_SIZE);
            let max_payload = layout.variants.iter().map(|v| v.payload_size).max().unwrap_or(0);
            prop_assert_eq!(layout.payload_size, max_payload);
            prop_assert_eq!(layout.total_size, TAG_SIZE + max_payload);

            let discriminants: std::collections::HashSet<u32> = layout.variants.iter().map(|v| v.discriminant).collect();
            prop_assert_eq!(discriminants.len(), layout.variants.len(), "discriminants must be unique");

            for variant in &layout.variants {
                let mut prev_end = 0u32;
                for &offset in &variant.field_offsets {
                    prop_assert!(offset >= prev_end);
                    prev_end = offset;
                }
            }
        }
    }
}
