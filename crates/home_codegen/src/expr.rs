//! Expression lowering, following the
//! same split between `codegen::expr` (per-expression-kind
//! lowering) and `codegen::context` (shared mutable state) — here the
//! leaf operation is a sequence of raw instructions left evaluating into
//! [`FunctionContext::result_reg`] rather than a templated Rust
//! sub-expression string.
//!
//! **Value vs. reference semantics**: a `Path` to a scalar
//! loads its value; a `Path` to a struct/enum/array materializes a
//! pointer (`lea`) to its stack slot instead, since those are always
//! passed and assigned by reference within a frame.

use home_parser::ast::{BinOp, Expr, ExprKind, Literal, Pattern, UnOp};
use home_types::checker::key_of;
use home_types::ty::{TypeId, TypeShape};

use crate::context::FunctionContext;
use crate::emit::{Condition, Reg};
use crate::error::CodegenError;

pub fn lower_expr(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>) -> Result<(), CodegenError> {
    match &expr.kind {
        ExprKind::Literal(Literal::Bool(b)) => {
            ctx.encoder.mov_reg_imm32(ctx.result_reg(), *b as i32);
            Ok(())
        }
        ExprKind::Literal(Literal::Unit) => {
            ctx.encoder.mov_reg_imm32(ctx.result_reg(), 0);
            Ok(())
        }
        ExprKind::Literal(Literal::Int(text, base, _)) => {
            let value = parse_int(ctx.strings.resolve(*text), *base);
            ctx.encoder.mov_reg_imm32(ctx.result_reg(), value as i32);
            Ok(())
        }
        ExprKind::Literal(Literal::Float(_, _)) | ExprKind::Literal(Literal::Char(_)) => {
            // SSE/XMM lowering is out of scope for the integer-first
            // pipeline this code generator currently targets.
            Err(CodegenError::UnsupportedOp { op: "floating-point/char literal".into() })
        }
        ExprKind::Str(content) => {
            let pooled = ctx.intern_str_literal(*content);
            ctx.encoder.lea_rip_symbol(ctx.result_reg(), pooled.label);
            Ok(())
        }
        ExprKind::Path(name) => {
            let is_aggregate = aggregate_type(ctx, expr);
            let disp = ctx.local_offset(*name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
            if is_aggregate {
                ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, disp);
            } else {
                ctx.encoder.mov_reg_mem(ctx.result_reg(), Reg::Rbp, disp);
            }
            Ok(())
        }
        ExprKind::Unary(UnOp::Neg, inner) => {
            lower_expr(ctx, inner)?;
            let reg = ctx.result_reg();
            // `reg = 0 - reg` via a reserved temp: `NEG_TEMP` never holds a
            // live expression value across `lower_expr` calls.
            ctx.encoder.mov_reg_imm32(NEG_TEMP, 0);
            ctx.encoder.sub_reg_reg(NEG_TEMP, reg);
            ctx.encoder.mov_reg_reg(reg, NEG_TEMP);
            Ok(())
        }
        ExprKind::Unary(UnOp::Not, inner) => {
            lower_expr(ctx, inner)?;
            let reg = ctx.result_reg();
            // `reg = 1 - reg` flips a 0/1 boolean without a dedicated NOT-bool opcode.
            ctx.encoder.mov_reg_imm32(NEG_TEMP, 1);
            ctx.encoder.sub_reg_reg(NEG_TEMP, reg);
            ctx.encoder.mov_reg_reg(reg, NEG_TEMP);
            Ok(())
        }
        ExprKind::Unary(UnOp::Ref | UnOp::RefMut, inner) => {
            if let ExprKind::Path(name) = inner.kind {
                let disp = ctx.local_offset(name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
                ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, disp);
                Ok(())
            } else {
                Err(CodegenError::UnsupportedOp { op: "reference to a non-binding place".into() })
            }
        }
        ExprKind::Unary(UnOp::Deref, inner) => {
            lower_expr(ctx, inner)?;
            let reg = ctx.result_reg();
            ctx.encoder.mov_reg_mem(reg, reg, 0);
            Ok(())
        }
        ExprKind::Binary(BinOp::And | BinOp::Or, lhs, rhs) => lower_short_circuit(ctx, expr, lhs, rhs),
        ExprKind::Binary(op, lhs, rhs) => lower_binary(ctx, expr, *op, lhs, rhs),
        ExprKind::Call { callee, args } => lower_call(ctx, expr, callee, args),
        ExprKind::Field { base, field } => {
            if let Some(enum_name) = enum_zero_ctor(ctx, base, *field) {
                lower_enum_ctor(ctx, expr, enum_name, *field, &[])
            } else {
                lower_field(ctx, base, *field)
            }
        }
        ExprKind::MethodCall { receiver, method, args } => {
            if let Some(enum_name) = enum_ctor_name(ctx, receiver, *method) {
                lower_enum_ctor(ctx, expr, enum_name, *method, args)
            } else {
                Err(CodegenError::UnsupportedOp { op: "trait method dispatch".into() })
            }
        }
        ExprKind::StructLit { path, fields } => lower_struct_lit(ctx, expr, *path, fields),
        ExprKind::Array(elems) => lower_array(ctx, expr, elems),
        ExprKind::Index { base, index } => lower_index(ctx, base, index),
        ExprKind::Match { scrutinee, arms } => lower_match(ctx, scrutinee, arms),
        ExprKind::Try(inner) => lower_try(ctx, inner),
        ExprKind::Block(block) => {
            for stmt in block.stmts {
                crate::stmt::lower_stmt(ctx, stmt)?;
            }
            if let Some(tail) = block.tail {
                lower_expr(ctx, tail)?;
            } else {
                ctx.encoder.mov_reg_imm32(ctx.result_reg(), 0);
            }
            Ok(())
        }
        ExprKind::If { cond, then_branch, else_branch } => lower_if(ctx, cond, then_branch, *else_branch),
        ExprKind::Tuple(elems) => lower_tuple(ctx, expr, elems),
        ExprKind::Cast { expr: inner, .. } => lower_cast(ctx, expr, inner),
        // Neither lowers to any instructions of its own: a `comptime { .. }`
        // block's value is produced by evaluating the exact same
        // expression the runtime would, since every construct
        // `home-comptime` accepts is by definition also valid to execute
        // at runtime; `await` never suspends because this pipeline has no
        // async runtime wired in to register interest with, so a future
        // that would `Pending` here instead just runs its body straight
        // through to its `Ready` value.
        ExprKind::Comptime(inner) | ExprKind::Await(inner) => lower_expr(ctx, inner),
        // Usually reached through `lower_stmt` (a `break`/`continue`
        // statement with a trailing semicolon), but a block can also end
        // in one with no semicolon (e.g. `{ break }` as a loop body's last
        // line), which routes through `lower_expr` via the block's `tail`
        // instead.
        ExprKind::Break(value) => crate::stmt::lower_break(ctx, value.as_deref()),
        ExprKind::Continue => crate::stmt::lower_continue(ctx),
        ExprKind::Return(value) => {
            match value {
                Some(v) => finish_return_value(ctx, v)?,
                None => ctx.encoder.mov_reg_imm32(Reg::Rax, 0),
            }
            // Epilogue (`leave`-equivalent mov/pop, then ret) is emitted by
            // `program::lower_fn` once, at the single exit point every
            // `return` here jumps to; `lower_expr` only computes the value.
            Ok(())
        }
        _ => Err(CodegenError::UnsupportedOp { op: format!("{:?}", expr.kind) }),
    }
}

/// Reserved for scratch work — [`UnOp::Neg`]/[`UnOp::Not`] lowering and the
/// aggregate byte-copy helper — never one of [`crate::context::SCRATCH_REGS`],
/// so it can't collide with a value the surrounding expression still needs.
const NEG_TEMP: Reg = Reg::R10;

/// Shared by the explicit `return <expr>;` case above and the implicit
/// function-tail return in `crate::program::lower_fn`: copies an aggregate
/// result through the caller-supplied destination pointer (the sret
/// convention), or moves a scalar result straight into `rax`.
pub(crate) fn finish_return_value(ctx: &mut FunctionContext<'_>, value: &Expr<'_>) -> Result<(), CodegenError> {
    lower_expr(ctx, value)?;
    let src = ctx.result_reg();
    if let Some(ret_disp) = ctx.ret_ptr_disp() {
        let size = aggregate_size(ctx, expr_type(ctx, value));
        ctx.encoder.mov_reg_mem(Reg::R12, Reg::Rbp, ret_disp);
        copy_aggregate(ctx, Reg::R12, 0, src, 0, size);
        ctx.encoder.mov_reg_reg(Reg::Rax, Reg::R12);
    } else if src != Reg::Rax {
        ctx.encoder.mov_reg_reg(Reg::Rax, src);
    }
    Ok(())
}

fn expr_type(ctx: &FunctionContext<'_>, expr: &Expr<'_>) -> TypeId {
    crate::types::expr_type(ctx.typed, key_of(expr))
}

/// Byte size of a resolved type, consulting the already-computed struct/enum
/// layouts rather than recomputing field packing here.
pub(crate) fn aggregate_size(ctx: &FunctionContext<'_>, ty: TypeId) -> u32 {
    let interner = &ctx.typed.interner;
    if let Some(size) = interner.size_of_primitive(ty) {
        return size;
    }
    match interner.shape(ty) {
        TypeShape::Generic(name, _) => ctx
            .layouts
            .structs
            .get(name)
            .map(|s| s.total_size)
            .or_else(|| ctx.layouts.enums.get(name).map(|e| e.total_size))
            .unwrap_or(8),
        TypeShape::Array(elem, len) => (aggregate_size(ctx, *elem) as u64 * *len) as u32,
        _ => 8,
    }
}

/// Copies `size` bytes from `[src_base + src_disp]` to
/// `[dst_base + dst_disp]` in 8-byte chunks via a scratch register, with an
/// exact-4-byte dword path for the common struct/enum-payload remainder;
/// any other odd remainder falls back to one more (over-reading) 8-byte
/// chunk, safe because every aggregate's own stack slot is rounded up to
/// at least 8-byte alignment.
pub(crate) fn copy_aggregate(ctx: &mut FunctionContext<'_>, dst_base: Reg, dst_disp: i32, src_base: Reg, src_disp: i32, size: u32) {
    let mut offset = 0i32;
    while offset + 8 <= size as i32 {
        ctx.encoder.mov_reg_mem(NEG_TEMP, src_base, src_disp + offset);
        ctx.encoder.mov_mem_reg(dst_base, dst_disp + offset, NEG_TEMP);
        offset += 8;
    }
    let remainder = size as i32 - offset;
    if remainder == 4 {
        ctx.encoder.movsx_reg_mem32(NEG_TEMP, src_base, src_disp + offset);
        ctx.encoder.mov_mem_reg32(dst_base, dst_disp + offset, NEG_TEMP);
    } else if remainder > 0 {
        ctx.encoder.mov_reg_mem(NEG_TEMP, src_base, src_disp + offset);
        ctx.encoder.mov_mem_reg(dst_base, dst_disp + offset, NEG_TEMP);
    }
}

/// `Enum.Variant` with no call parens, where `Variant` is a zero-field
/// variant of the enum `base` names — the same disambiguation
/// `home_types::checker::infer_field` performs, mirrored here since codegen
/// re-walks the same untyped shape of the AST.
fn enum_zero_ctor(ctx: &FunctionContext<'_>, base: &Expr<'_>, field: home_base::Symbol) -> Option<home_base::Symbol> {
    let ExprKind::Path(name) = base.kind else { return None };
    let shape = ctx.typed.enums.get(&name)?;
    shape.variants.iter().any(|(n, fields)| *n == field && fields.is_empty()).then_some(name)
}

/// `Enum.Variant(args)`, parsed as a method call on a path receiver —
/// mirrors `home_types::checker::infer_method_call`'s disambiguation.
fn enum_ctor_name(ctx: &FunctionContext<'_>, receiver: &Expr<'_>, method: home_base::Symbol) -> Option<home_base::Symbol> {
    let ExprKind::Path(name) = receiver.kind else { return None };
    let shape = ctx.typed.enums.get(&name)?;
    shape.variants.iter().any(|(n, _)| *n == method).then_some(name)
}

fn lower_struct_lit(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, path: home_base::Symbol, fields: &[(home_base::Symbol, Expr<'_>)]) -> Result<(), CodegenError> {
    let dest_disp = ctx.temp_disp(key_of(expr)).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{path:?}") })?;
    let layout = ctx.layouts.structs.get(&path).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{path:?}") })?.clone();

    for (fname, fexpr) in fields {
        let field_layout = layout.fields.iter().find(|f| f.name == *fname).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{fname:?}") })?.clone();
        lower_expr(ctx, fexpr)?;
        let src = ctx.result_reg();
        let field_disp = dest_disp + field_layout.offset as i32;
        if crate::types::is_aggregate(&ctx.typed.interner, field_layout.ty) {
            copy_aggregate(ctx, Reg::Rbp, field_disp, src, 0, field_layout.size);
        } else {
            ctx.encoder.mov_mem_reg(Reg::Rbp, field_disp, src);
        }
    }
    ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, dest_disp);
    Ok(())
}

fn lower_enum_ctor(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, enum_name: home_base::Symbol, variant: home_base::Symbol, args: &[Expr<'_>]) -> Result<(), CodegenError> {
    let dest_disp = ctx.temp_disp(key_of(expr)).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{enum_name:?}") })?;
    let layout = ctx.layouts.enums.get(&enum_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{enum_name:?}") })?.clone();
    let variant_layout = layout.variants.iter().find(|v| v.name == variant).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{variant:?}") })?.clone();
    let field_tys = ctx
        .typed
        .enums
        .get(&enum_name)
        .and_then(|shape| shape.variants.iter().find(|(n, _)| *n == variant).map(|(_, tys)| tys.clone()))
        .unwrap_or_default();

    ctx.encoder.mov_mem_imm32(Reg::Rbp, dest_disp, variant_layout.discriminant as i32);

    for ((arg, field_off), field_ty) in args.iter().zip(variant_layout.field_offsets.iter()).zip(field_tys.iter()) {
        lower_expr(ctx, arg)?;
        let src = ctx.result_reg();
        let field_disp = dest_disp + layout.tag_size as i32 + *field_off as i32;
        if crate::types::is_aggregate(&ctx.typed.interner, *field_ty) {
            let size = aggregate_size(ctx, *field_ty);
            copy_aggregate(ctx, Reg::Rbp, field_disp, src, 0, size);
        } else {
            ctx.encoder.mov_mem_reg(Reg::Rbp, field_disp, src);
        }
    }
    ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, dest_disp);
    Ok(())
}

fn lower_array(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, elems: &[Expr<'_>]) -> Result<(), CodegenError> {
    let dest_disp = ctx.temp_disp(key_of(expr)).ok_or_else(|| CodegenError::UnresolvedType { name: "<array literal>".into() })?;
    let array_ty = expr_type(ctx, expr);
    let TypeShape::Array(elem_ty, _) = ctx.typed.interner.shape(array_ty) else {
        return Err(CodegenError::UnresolvedType { name: "<array literal>".into() });
    };
    let elem_ty = *elem_ty;
    let elem_size = aggregate_size(ctx, elem_ty);
    let is_agg_elem = crate::types::is_aggregate(&ctx.typed.interner, elem_ty);

    for (i, elem) in elems.iter().enumerate() {
        lower_expr(ctx, elem)?;
        let src = ctx.result_reg();
        let slot_disp = dest_disp + (i as i32) * (elem_size as i32);
        if is_agg_elem {
            copy_aggregate(ctx, Reg::Rbp, slot_disp, src, 0, elem_size);
        } else {
            ctx.encoder.mov_mem_reg(Reg::Rbp, slot_disp, src);
        }
    }
    ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, dest_disp);
    Ok(())
}

/// A tuple literal packs its elements ascending the same way a struct
/// packs named fields (`crate::layout::tuple_field_offsets` mirrors
/// `resolve_struct`'s offset arithmetic), into an anonymous temp slot keyed
/// by the tuple expression's own `NodeKey`.
fn lower_tuple(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, elems: &[Expr<'_>]) -> Result<(), CodegenError> {
    let dest_disp = ctx.temp_disp(key_of(expr)).ok_or_else(|| CodegenError::UnresolvedType { name: "<tuple literal>".into() })?;
    let tuple_ty = expr_type(ctx, expr);
    let TypeShape::Tuple(elem_tys) = ctx.typed.interner.shape(tuple_ty) else {
        return Err(CodegenError::UnresolvedType { name: "<tuple literal>".into() });
    };
    let offsets = crate::layout::tuple_field_offsets(elem_tys, ctx.typed, ctx.layouts);

    for (elem, (offset, size)) in elems.iter().zip(offsets.iter()) {
        lower_expr(ctx, elem)?;
        let src = ctx.result_reg();
        let slot_disp = dest_disp + *offset as i32;
        let elem_ty = expr_type(ctx, elem);
        if crate::types::is_aggregate(&ctx.typed.interner, elem_ty) {
            copy_aggregate(ctx, Reg::Rbp, slot_disp, src, 0, *size);
        } else {
            ctx.encoder.mov_mem_reg(Reg::Rbp, slot_disp, src);
        }
    }
    ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, dest_disp);
    Ok(())
}

/// Binds a tuple pattern's leaf names against the flat, ascending-offset
/// layout `crate::layout::tuple_field_offsets` already computes for a
/// tuple literal — `base_reg`/`base_disp` address the tuple's start (a
/// `match` scrutinee's materialized pointer, or a destructuring `let`'s
/// initializer pointer), and a nested `Tuple` sub-pattern just recurses
/// with the same base and an accumulated offset, since nested tuples are
/// packed inline rather than boxed. Shared by `lower_match`'s `Tuple` arm
/// and `crate::stmt::lower_stmt`'s destructuring-`let` case.
pub(crate) fn bind_tuple_elements(ctx: &mut FunctionContext<'_>, pats: &[Pattern<'_>], elem_tys: &[TypeId], base_reg: Reg, base_disp: i32) -> Result<(), CodegenError> {
    let offsets = crate::layout::tuple_field_offsets(elem_tys, ctx.typed, ctx.layouts);
    for (pat, (ty, (offset, size))) in pats.iter().zip(elem_tys.iter().zip(offsets.iter())) {
        let field_disp = base_disp + *offset as i32;
        match pat {
            Pattern::Binding { name, .. } => {
                let dest_disp = ctx.local_offset(*name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
                if crate::types::is_aggregate(&ctx.typed.interner, *ty) {
                    copy_aggregate(ctx, Reg::Rbp, dest_disp, base_reg, field_disp, *size);
                } else {
                    ctx.encoder.mov_reg_mem(Reg::R9, base_reg, field_disp);
                    ctx.encoder.mov_mem_reg(Reg::Rbp, dest_disp, Reg::R9);
                }
            }
            Pattern::Tuple(inner_pats) => {
                if let TypeShape::Tuple(inner_tys) = ctx.typed.interner.shape(*ty) {
                    let inner_tys = inner_tys.clone();
                    bind_tuple_elements(ctx, inner_pats, &inner_tys, base_reg, field_disp)?;
                }
            }
            // A literal/struct/enum-variant sub-pattern inside a tuple
            // isn't tested structurally yet, matching `lower_match`'s
            // top-level `Struct`/`Or` best-effort fallback.
            Pattern::Wildcard | Pattern::Literal(_) | Pattern::Struct { .. } | Pattern::EnumVariant { .. } | Pattern::Or(_) => {}
        }
    }
    Ok(())
}

/// `expr as T`: this pipeline keeps every integer width in a full 64-bit
/// register rather than tracking a narrower physical size, so a numeric
/// cast only has work to do when the *target* width is narrower than 64
/// bits — truncating (unsigned) or sign-extending (signed) through the
/// matching-width `movzx`/`movsx`/32-bit-mov so the upper bits read back
/// exactly as a real `iN`/`uN` value would. Casting to a wider or
/// equal-width integer, or to `bool`, is a no-op: the source is already
/// computed at that width or wider.
fn lower_cast(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, inner: &Expr<'_>) -> Result<(), CodegenError> {
    lower_expr(ctx, inner)?;
    let reg = ctx.result_reg();
    let target_ty = expr_type(ctx, expr);
    if let Some(width) = crate::types::int_width(&ctx.typed.interner, target_ty) {
        match (width.bits(), width.is_signed()) {
            (8, true) => ctx.encoder.movsx_reg_reg8(reg, reg),
            (8, false) => ctx.encoder.movzx_reg_reg8(reg, reg),
            (16, true) => ctx.encoder.movsx_reg_reg16(reg, reg),
            (16, false) => ctx.encoder.movzx_reg_reg16(reg, reg),
            (32, true) => ctx.encoder.movsx_reg_reg32(reg, reg),
            (32, false) => ctx.encoder.mov_reg_reg32(reg, reg),
            _ => {}
        }
    }
    Ok(())
}

/// `base[index]`: the base already materializes element 0's address (an
/// aggregate `Path`/`Field`/nested-`Index` place — its reserved slot is one
/// contiguous block starting at that address, elements packed ascending
/// the same way struct fields are), so indexing adds `index * elem_size`
/// to walk toward the higher address element `i` lives at, then loads the
/// element if it's scalar.
fn lower_index(ctx: &mut FunctionContext<'_>, base: &Expr<'_>, index: &Expr<'_>) -> Result<(), CodegenError> {
    let base_ty = expr_type(ctx, base);
    let TypeShape::Array(elem_ty, _) = ctx.typed.interner.shape(base_ty) else {
        return Err(CodegenError::UnsupportedOp { op: "index into a non-array base".into() });
    };
    let elem_ty = *elem_ty;
    let elem_size = aggregate_size(ctx, elem_ty);
    let is_agg_elem = crate::types::is_aggregate(&ctx.typed.interner, elem_ty);

    lower_expr(ctx, base)?;
    let base_reg = ctx.result_reg();
    ctx.push_depth();
    lower_expr(ctx, index)?;
    let idx_reg = ctx.result_reg();
    ctx.pop_depth();

    ctx.encoder.imul_reg_imm32(idx_reg, elem_size as i32);
    ctx.encoder.add_reg_reg(base_reg, idx_reg);
    if !is_agg_elem {
        ctx.encoder.mov_reg_mem(base_reg, base_reg, 0);
    }
    Ok(())
}

fn literal_i32(ctx: &FunctionContext<'_>, lit: &Literal) -> i32 {
    match lit {
        Literal::Int(text, base, _) => parse_int(ctx.strings.resolve(*text), *base) as i32,
        Literal::Bool(b) => *b as i32,
        _ => 0,
    }
}

/// Lowers a `match`, dispatching on the scrutinee's enum discriminant (or,
/// for a literal/binding pattern over a scalar scrutinee, a direct value
/// comparison). `R12`/`R13` hold the scrutinee's materialized
/// value/pointer and its discriminant across every arm, since arm bodies
/// run at the same `SCRATCH_REGS` depth the scrutinee itself was
/// evaluated at.
fn lower_match(ctx: &mut FunctionContext<'_>, scrutinee: &Expr<'_>, arms: &[home_parser::ast::MatchArm<'_>]) -> Result<(), CodegenError> {
    lower_expr(ctx, scrutinee)?;
    let scrut_reg = ctx.result_reg();
    ctx.encoder.mov_reg_reg(Reg::R12, scrut_reg);

    let scrutinee_ty = expr_type(ctx, scrutinee);
    let enum_name = match ctx.typed.interner.shape(scrutinee_ty) {
        TypeShape::Generic(name, _) => Some(*name),
        _ => None,
    };
    if enum_name.is_some() {
        ctx.encoder.mov_reg_mem(Reg::R13, Reg::R12, 0);
    }

    let mut end_jumps = Vec::new();
    let mut fail_patches: Vec<usize> = Vec::new();
    for (i, arm) in arms.iter().enumerate() {
        let here = ctx.encoder.len();
        for p in fail_patches.drain(..) {
            ctx.encoder.patch_rel32(p, here);
        }

        match &arm.pattern {
            Pattern::EnumVariant { path, variant, fields } => {
                let layout = ctx.layouts.enums.get(path).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{path:?}") })?.clone();
                let variant_layout = layout.variants.iter().find(|v| v.name == *variant).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{variant:?}") })?.clone();
                ctx.encoder.mov_reg_imm32(Reg::R11, variant_layout.discriminant as i32);
                ctx.encoder.cmp_reg_reg(Reg::R13, Reg::R11);
                fail_patches.push(ctx.encoder.jcc_rel32(Condition::NotEqual));

                for (p, field_off) in fields.iter().zip(variant_layout.field_offsets.iter()) {
                    if let Pattern::Binding { name: bind_name, .. } = p {
                        let dest_disp = ctx.local_offset(*bind_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{bind_name:?}") })?;
                        let src_off = layout.tag_size as i32 + *field_off as i32;
                        ctx.encoder.mov_reg_mem(Reg::R9, Reg::R12, src_off);
                        ctx.encoder.mov_mem_reg(Reg::Rbp, dest_disp, Reg::R9);
                    }
                }
            }
            Pattern::Literal(lit) => {
                let imm = literal_i32(ctx, lit);
                ctx.encoder.mov_reg_imm32(Reg::R11, imm);
                ctx.encoder.cmp_reg_reg(Reg::R12, Reg::R11);
                fail_patches.push(ctx.encoder.jcc_rel32(Condition::NotEqual));
            }
            Pattern::Binding { name: bind_name, .. } => {
                if let Some(dest_disp) = ctx.local_offset(*bind_name) {
                    ctx.encoder.mov_mem_reg(Reg::Rbp, dest_disp, Reg::R12);
                }
            }
            Pattern::Tuple(pats) => {
                // A tuple pattern's arity always matches its scrutinee's
                // type (the type checker rejects any other shape), so
                // there's no runtime test to emit here — only binding the
                // sub-patterns' names against the tuple's already-flat,
                // ascending-offset field layout.
                if let TypeShape::Tuple(elem_tys) = ctx.typed.interner.shape(scrutinee_ty) {
                    let elem_tys = elem_tys.clone();
                    bind_tuple_elements(ctx, pats, &elem_tys, Reg::R12, 0)?;
                }
            }
            Pattern::Struct { path, fields } => {
                // A struct has no discriminant to test either (unlike
                // `EnumVariant`, one `path` is the only shape a struct
                // pattern can ever name), so this only binds each named
                // field's sub-pattern the same way the `EnumVariant` arm
                // above binds a variant's positional fields.
                let layout = ctx.layouts.structs.get(path).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{path:?}") })?.clone();
                for (fname, fpat) in *fields {
                    let Pattern::Binding { name: bind_name, .. } = fpat else { continue };
                    let field_layout = layout.fields.iter().find(|f| f.name == *fname).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{fname:?}") })?;
                    let dest_disp = ctx.local_offset(*bind_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{bind_name:?}") })?;
                    if crate::types::is_aggregate(&ctx.typed.interner, field_layout.ty) {
                        copy_aggregate(ctx, Reg::Rbp, dest_disp, Reg::R12, field_layout.offset as i32, field_layout.size);
                    } else {
                        ctx.encoder.mov_reg_mem(Reg::R9, Reg::R12, field_layout.offset as i32);
                        ctx.encoder.mov_mem_reg(Reg::Rbp, dest_disp, Reg::R9);
                    }
                }
            }
            Pattern::Wildcard | Pattern::Or(_) => {
                // Best-effort: always matches. Exhaustive structural
                // destructuring beyond enum variants, tuples, and structs
                // isn't required by any scenario this code generator
                // currently targets — `Or` needs a try-each-alternative
                // control-flow shape this single-pass-per-arm dispatch
                // doesn't have yet.
            }
        }

        if let Some(guard) = arm.guard {
            lower_expr(ctx, guard)?;
            let g = ctx.result_reg();
            ctx.encoder.mov_reg_imm32(Reg::R11, 0);
            ctx.encoder.cmp_reg_reg(g, Reg::R11);
            fail_patches.push(ctx.encoder.jcc_rel32(Condition::Equal));
        }

        lower_expr(ctx, arm.body)?;
        if i + 1 != arms.len() {
            end_jumps.push(ctx.encoder.jmp_rel32());
        }
    }
    let end = ctx.encoder.len();
    for p in fail_patches {
        ctx.encoder.patch_rel32(p, end);
    }
    for j in end_jumps {
        ctx.encoder.patch_rel32(j, end);
    }
    Ok(())
}

/// `expr?`: convention is the enum's first-declared variant is the success
/// arm — on match, projects its first payload field as the value; on any
/// other discriminant, returns that discriminant straight out of the
/// enclosing function (propagating the error value as the function's own
/// result), bypassing the single shared epilogue since control never falls
/// back out of this branch.
fn lower_try(ctx: &mut FunctionContext<'_>, inner: &Expr<'_>) -> Result<(), CodegenError> {
    lower_expr(ctx, inner)?;
    let ptr_reg = ctx.result_reg();
    ctx.encoder.mov_reg_reg(Reg::R12, ptr_reg);

    let inner_ty = expr_type(ctx, inner);
    let TypeShape::Generic(enum_name, _) = ctx.typed.interner.shape(inner_ty) else {
        return Err(CodegenError::UnsupportedOp { op: "`?` on a non-enum expression".into() });
    };
    let layout = ctx.layouts.enums.get(enum_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{enum_name:?}") })?.clone();
    let ok_variant = layout.variants.first().ok_or_else(|| CodegenError::UnresolvedType { name: format!("{enum_name:?}") })?.clone();

    ctx.encoder.mov_reg_mem(Reg::R13, Reg::R12, 0);
    ctx.encoder.mov_reg_imm32(Reg::R11, ok_variant.discriminant as i32);
    ctx.encoder.cmp_reg_reg(Reg::R13, Reg::R11);
    let is_err_patch = ctx.encoder.jcc_rel32(Condition::NotEqual);

    let field_off = ok_variant.field_offsets.first().copied().unwrap_or(0) as i32;
    ctx.encoder.mov_reg_mem(ctx.result_reg(), Reg::R12, layout.tag_size as i32 + field_off);
    let jump_past_err = ctx.encoder.jmp_rel32();

    let err_start = ctx.encoder.len();
    ctx.encoder.patch_rel32(is_err_patch, err_start);
    ctx.encoder.mov_reg_reg(Reg::Rax, Reg::R13);
    ctx.encoder.mov_reg_reg(Reg::Rsp, Reg::Rbp);
    ctx.encoder.pop_reg(Reg::Rbp);
    ctx.encoder.ret();

    let end = ctx.encoder.len();
    ctx.encoder.patch_rel32(jump_past_err, end);
    Ok(())
}

fn aggregate_type(ctx: &FunctionContext<'_>, expr: &Expr<'_>) -> bool {
    let ty = crate::types::expr_type(ctx.typed, key_of(expr));
    crate::types::is_aggregate(&ctx.typed.interner, ty)
}

fn parse_int(text: &str, base: home_lexer::NumberBase) -> i64 {
    let radix = match base {
        home_lexer::NumberBase::Binary => 2,
        home_lexer::NumberBase::Octal => 8,
        home_lexer::NumberBase::Decimal => 10,
        home_lexer::NumberBase::Hex => 16,
    };
    // The lexer already validated every digit against `base` and stripped
    // underscores;
    // a parse failure here means a literal wider than 64 bits, which this
    // integer-first pipeline doesn't yet materialize as a true i128 constant.
    i64::from_str_radix(text, radix).unwrap_or(0)
}

fn lower_binary(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, op: BinOp, lhs: &Expr<'_>, rhs: &Expr<'_>) -> Result<(), CodegenError> {
    lower_expr(ctx, lhs)?;
    let lhs_reg = ctx.result_reg();
    ctx.push_depth();
    lower_expr(ctx, rhs)?;
    let rhs_reg = ctx.result_reg();
    ctx.pop_depth();

    match op {
        BinOp::Add => ctx.encoder.add_reg_reg(lhs_reg, rhs_reg),
        BinOp::Sub => ctx.encoder.sub_reg_reg(lhs_reg, rhs_reg),
        BinOp::Mul => ctx.encoder.imul_reg_reg(lhs_reg, rhs_reg),
        BinOp::Div | BinOp::Rem => {
            let signed = is_signed(ctx, lhs);
            ctx.encoder.mov_reg_reg(Reg::Rax, lhs_reg);
            if signed {
                ctx.encoder.idiv_reg(rhs_reg);
            } else {
                ctx.encoder.div_reg(rhs_reg);
            }
            let dest = if matches!(op, BinOp::Div) { Reg::Rax } else { Reg::Rdx };
            ctx.encoder.mov_reg_reg(lhs_reg, dest);
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            ctx.encoder.cmp_reg_reg(lhs_reg, rhs_reg);
            ctx.encoder.setcc_reg(condition_of(op), lhs_reg);
        }
        BinOp::And | BinOp::Or => unreachable!("short-circuit operators lowered separately"),
    }
    if lhs_reg != ctx.result_reg() {
        let dest = ctx.result_reg();
        ctx.encoder.mov_reg_reg(dest, lhs_reg);
    }
    let _ = expr;
    Ok(())
}

fn condition_of(op: BinOp) -> Condition {
    match op {
        BinOp::Eq => Condition::Equal,
        BinOp::Ne => Condition::NotEqual,
        BinOp::Lt => Condition::Less,
        BinOp::Le => Condition::LessEqual,
        BinOp::Gt => Condition::Greater,
        BinOp::Ge => Condition::GreaterEqual,
        _ => unreachable!(),
    }
}

fn is_signed(ctx: &FunctionContext<'_>, expr: &Expr<'_>) -> bool {
    let ty = crate::types::expr_type(ctx.typed, key_of(expr));
    crate::types::int_width(&ctx.typed.interner, ty).map(|w| w.is_signed()).unwrap_or(true)
}

/// `&&`/`||` short-circuit: the right-hand side is only evaluated when the
/// left-hand side doesn't already decide the result.
fn lower_short_circuit(ctx: &mut FunctionContext<'_>, _expr: &Expr<'_>, lhs: &Expr<'_>, rhs: &Expr<'_>) -> Result<(), CodegenError> {
    let is_and = matches!(_expr.kind, ExprKind::Binary(BinOp::And, ..));
    lower_expr(ctx, lhs)?;
    let reg = ctx.result_reg();
    ctx.encoder.mov_reg_imm32(Reg::Rdx, 0);
    ctx.encoder.cmp_reg_reg(reg, Reg::Rdx);
    let skip_cond = if is_and { Condition::Equal } else { Condition::NotEqual };
    let patch = ctx.encoder.jcc_rel32(skip_cond);
    lower_expr(ctx, rhs)?;
    let rhs_reg = ctx.result_reg();
    if rhs_reg != reg {
        ctx.encoder.mov_reg_reg(reg, rhs_reg);
    }
    let target = ctx.encoder.len();
    ctx.encoder.patch_rel32(patch, target);
    Ok(())
}

/// Callee-side half of this convention lives in `program::lower_fn`; here,
/// when the callee returns an aggregate, the destination's address is
/// computed up front and held in `R14` (untouched by `ARG_REGS`/
/// `SCRATCH_REGS`) until immediately before the call, so evaluating nested
/// call arguments can't clobber it.
fn lower_call(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>, callee: &Expr<'_>, args: &[Expr<'_>]) -> Result<(), CodegenError> {
    let ExprKind::Path(name) = callee.kind else {
        return Err(CodegenError::UnsupportedOp { op: "indirect call through a non-path callee".into() });
    };
    let ret_is_aggregate = ctx.typed.functions.get(&name).map(|shape| crate::types::is_aggregate(&ctx.typed.interner, shape.ret)).unwrap_or(false);

    let mut arg_base = 0usize;
    if ret_is_aggregate {
        let dest_disp = ctx.temp_disp(key_of(expr)).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
        ctx.encoder.lea(Reg::R14, Reg::Rbp, dest_disp);
        arg_base = 1;
    }

    for (i, arg) in args.iter().enumerate() {
        lower_expr(ctx, arg)?;
        let src = ctx.result_reg();
        if i + arg_base < Reg::ARG_REGS.len() {
            ctx.encoder.mov_reg_reg(Reg::ARG_REGS[i + arg_base], src);
        }
    }
    if ret_is_aggregate {
        ctx.encoder.mov_reg_reg(Reg::Rdi, Reg::R14);
    }
    ctx.encoder.call_symbol(name);

    if ret_is_aggregate {
        let dest_disp = ctx.temp_disp(key_of(expr)).unwrap();
        ctx.encoder.lea(ctx.result_reg(), Reg::Rbp, dest_disp);
    } else {
        let dest = ctx.result_reg();
        if dest != Reg::Rax {
            ctx.encoder.mov_reg_reg(dest, Reg::Rax);
        }
    }
    Ok(())
}

/// `if cond { then } else { else_ }`, both arms lowered to land their
/// result in the same register.
fn lower_if(ctx: &mut FunctionContext<'_>, cond: &Expr<'_>, then_branch: &Expr<'_>, else_branch: Option<&Expr<'_>>) -> Result<(), CodegenError> {
    lower_expr(ctx, cond)?;
    let cond_reg = ctx.result_reg();
    ctx.encoder.mov_reg_imm32(Reg::R11, 0);
    ctx.encoder.cmp_reg_reg(cond_reg, Reg::R11);
    let jump_to_else = ctx.encoder.jcc_rel32(Condition::Equal);

    lower_expr(ctx, then_branch)?;
    let jump_past_else = ctx.encoder.jmp_rel32();

    let else_start = ctx.encoder.len();
    ctx.encoder.patch_rel32(jump_to_else, else_start);
    if let Some(else_branch) = else_branch {
        lower_expr(ctx, else_branch)?;
    } else {
        ctx.encoder.mov_reg_imm32(ctx.result_reg(), 0);
    }
    let end = ctx.encoder.len();
    ctx.encoder.patch_rel32(jump_past_else, end);
    Ok(())
}

fn lower_field(ctx: &mut FunctionContext<'_>, base: &Expr<'_>, field: home_base::Symbol) -> Result<(), CodegenError> {
    let base_ty = ctx.typed.expr_types.get(&key_of(base)).copied().ok_or(CodegenError::UnresolvedType { name: "<field base>".into() })?;
    let offset = match ctx.typed.interner.shape(base_ty) {
        TypeShape::Generic(struct_name, _) => {
            let layout = ctx.layouts.structs.get(struct_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{struct_name:?}") })?;
            let field_layout = layout.fields.iter().find(|f| f.name == field).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{field:?}") })?;
            field_layout.offset as i32
        }
        // `t.0`, `t.1`, ... — the parser interns a tuple index's digits as a
        // plain field `Symbol` exactly like a struct field name, so a tuple
        // base is told apart from a struct one here by its resolved shape
        // rather than by a distinct `ExprKind`.
        TypeShape::Tuple(elem_tys) => {
            let index: usize = ctx.strings.resolve(field).parse().map_err(|_| CodegenError::UnresolvedType { name: format!("{field:?}") })?;
            let offsets = crate::layout::tuple_field_offsets(elem_tys, ctx.typed, ctx.layouts);
            offsets.get(index).map(|(o, _)| *o as i32).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{field:?}") })?
        }
        _ => return Err(CodegenError::UnresolvedType { name: "<non-struct field base>".into() }),
    };

    lower_expr(ctx, base)?;
    let reg = ctx.result_reg();
    ctx.encoder.mov_reg_mem(reg, reg, offset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use home_base::Interner;
    use home_diag::DiagnosticBag;
    use home_parser::Arena;
    use home_types::checker::TypeChecker;

    use crate::frame::build_frames;
    use crate::layout::LayoutTable;

    #[test]
    fn lowers_integer_addition_into_scratch_registers() {
        let mut strings = Interner::new();
        let src = "fn main() -> i32 { return 1 + 2; }";
        let (tokens, _) = home_lexer::Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut diagnostics = DiagnosticBag::new();
        let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);
        let layouts = LayoutTable::build(&typed).unwrap();
        let frames = build_frames(module.items, &typed, &layouts).unwrap();
        let home_parser::ast::ItemKind::Fn(def) = &module.items[0].kind else { panic!() };
        let frame = frames.get(&home_types::checker::key_of(def)).unwrap();
        let fn_symbols = HashMap::new();
        let mut pool = crate::strings::StringPool::new();
        let mut ctx = FunctionContext::new(frame, &layouts, &typed, &fn_symbols, &mut strings, &mut pool);
        let body = def.body.unwrap();
        let tail = body.tail.unwrap();
        let ExprKind::Return(Some(value)) = &tail.kind else { panic!("expected a return") };
        lower_expr(&mut ctx, value).unwrap();
        assert!(!ctx.encoder.code.is_empty());
    }
}
